#[cfg(test)]
mod tests {
    use cosmindex::{CosmindexRepo, CosmindexRepoConn, Repo};

    use crate::factory::{block_at, placeholder_block_at, random_chain};
    use crate::{find_block, test_runner};

    async fn persist_heights(
        conn: &mut CosmindexRepoConn<'_>,
        blockchain_id: i64,
        heights: &[i64],
    ) {
        for height in heights {
            CosmindexRepo::persist_block(conn, &block_at(blockchain_id, *height), &[])
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    pub async fn finds_the_first_hole_in_indexed_heights() {
        let pool = test_runner::get_pool().await;

        test_runner::run_test(&pool, |mut conn| async move {
            let blockchain_id =
                CosmindexRepo::get_or_create_chain(&mut conn, &random_chain()).await.unwrap();
            persist_heights(&mut conn, blockchain_id, &[10, 11, 12, 15]).await;

            let first_missing =
                CosmindexRepo::get_first_missing_block_in_range(&mut conn, blockchain_id, 10, 20)
                    .await
                    .unwrap();
            let highest = CosmindexRepo::get_highest_indexed_block(&mut conn, blockchain_id)
                .await
                .unwrap()
                .unwrap();

            assert_eq!(first_missing, 13);
            assert_eq!(highest.height, 15);
        })
        .await;
    }

    #[tokio::test]
    pub async fn scans_up_to_the_height_after_the_highest_indexed_block() {
        let pool = test_runner::get_pool().await;

        test_runner::run_test(&pool, |mut conn| async move {
            let blockchain_id =
                CosmindexRepo::get_or_create_chain(&mut conn, &random_chain()).await.unwrap();
            persist_heights(&mut conn, blockchain_id, &[1, 2, 3, 4, 5, 6]).await;

            let first_missing =
                CosmindexRepo::get_first_missing_block_in_range(&mut conn, blockchain_id, 1, 4)
                    .await
                    .unwrap();

            assert_eq!(first_missing, 7);
        })
        .await;
    }

    #[tokio::test]
    pub async fn falls_back_to_start_when_nothing_is_missing() {
        let pool = test_runner::get_pool().await;

        test_runner::run_test(&pool, |mut conn| async move {
            let blockchain_id =
                CosmindexRepo::get_or_create_chain(&mut conn, &random_chain()).await.unwrap();
            persist_heights(&mut conn, blockchain_id, &[3, 4, 5]).await;

            let first_missing =
                CosmindexRepo::get_first_missing_block_in_range(&mut conn, blockchain_id, 8, 2)
                    .await
                    .unwrap();

            assert_eq!(first_missing, 8);
        })
        .await;
    }

    #[tokio::test]
    pub async fn ignores_placeholder_blocks() {
        let pool = test_runner::get_pool().await;

        test_runner::run_test(&pool, |mut conn| async move {
            let blockchain_id =
                CosmindexRepo::get_or_create_chain(&mut conn, &random_chain()).await.unwrap();
            persist_heights(&mut conn, blockchain_id, &[1, 2]).await;
            let placeholder = placeholder_block_at(blockchain_id, 3);
            CosmindexRepo::persist_block(&mut conn, &placeholder, &[]).await.unwrap();
            CosmindexRepo::mark_block_events_indexed(&mut conn, &placeholder).await.unwrap();

            let highest = CosmindexRepo::get_highest_indexed_block(&mut conn, blockchain_id)
                .await
                .unwrap()
                .unwrap();
            let first_missing =
                CosmindexRepo::get_first_missing_block_in_range(&mut conn, blockchain_id, 1, 3)
                    .await
                    .unwrap();
            let events_indexed =
                CosmindexRepo::block_events_already_indexed(&mut conn, blockchain_id, 3)
                    .await
                    .unwrap();
            let blocks = CosmindexRepo::get_blocks_from_start(&mut conn, blockchain_id, 1, None)
                .await
                .unwrap();

            assert_eq!(highest.height, 2);
            assert_eq!(first_missing, 3);
            assert!(!events_indexed);
            assert!(CosmindexRepo::get_highest_event_indexed_block(&mut conn, blockchain_id)
                .await
                .unwrap()
                .is_none());
            assert_eq!(blocks.iter().map(|b| b.height).collect::<Vec<_>>(), vec![1, 2]);

            let saved_placeholder = find_block(&mut conn, blockchain_id, 3).await.unwrap();
            assert!(saved_placeholder.is_placeholder());
            assert!(saved_placeholder.block_events_indexed);
        })
        .await;
    }

    #[tokio::test]
    pub async fn reports_nothing_for_an_unindexed_chain() {
        let pool = test_runner::get_pool().await;

        test_runner::run_test(&pool, |mut conn| async move {
            let blockchain_id =
                CosmindexRepo::get_or_create_chain(&mut conn, &random_chain()).await.unwrap();

            assert!(CosmindexRepo::get_highest_indexed_block(&mut conn, blockchain_id)
                .await
                .unwrap()
                .is_none());
            assert_eq!(
                CosmindexRepo::get_first_missing_block_in_range(&mut conn, blockchain_id, 1, 10)
                    .await
                    .unwrap(),
                1
            );
        })
        .await;
    }

    #[tokio::test]
    pub async fn tracks_event_indexing_separately() {
        let pool = test_runner::get_pool().await;

        test_runner::run_test(&pool, |mut conn| async move {
            let blockchain_id =
                CosmindexRepo::get_or_create_chain(&mut conn, &random_chain()).await.unwrap();
            persist_heights(&mut conn, blockchain_id, &[1, 2, 3]).await;
            CosmindexRepo::mark_block_events_indexed(&mut conn, &block_at(blockchain_id, 2))
                .await
                .unwrap();

            let highest_event_indexed =
                CosmindexRepo::get_highest_event_indexed_block(&mut conn, blockchain_id)
                    .await
                    .unwrap()
                    .unwrap();

            assert_eq!(highest_event_indexed.height, 2);
            assert!(CosmindexRepo::block_events_already_indexed(&mut conn, blockchain_id, 2)
                .await
                .unwrap());
            assert!(!CosmindexRepo::block_events_already_indexed(&mut conn, blockchain_id, 3)
                .await
                .unwrap());
        })
        .await;
    }

    #[tokio::test]
    pub async fn lists_blocks_within_bounds_in_height_order() {
        let pool = test_runner::get_pool().await;

        test_runner::run_test(&pool, |mut conn| async move {
            let blockchain_id =
                CosmindexRepo::get_or_create_chain(&mut conn, &random_chain()).await.unwrap();
            persist_heights(&mut conn, blockchain_id, &[9, 3, 7, 5]).await;

            let bounded = CosmindexRepo::get_blocks_from_start(&mut conn, blockchain_id, 4, Some(8))
                .await
                .unwrap();
            let unbounded = CosmindexRepo::get_blocks_from_start(&mut conn, blockchain_id, 4, None)
                .await
                .unwrap();

            assert_eq!(bounded.iter().map(|b| b.height).collect::<Vec<_>>(), vec![5, 7]);
            assert_eq!(unbounded.iter().map(|b| b.height).collect::<Vec<_>>(), vec![5, 7, 9]);
        })
        .await;
    }
}
