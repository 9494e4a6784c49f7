#[cfg(test)]
mod tests {
    use cosmindex::{CosmindexRepo, Repo};

    use crate::factory::{block_at, random_chain};
    use crate::{find_chain, test_runner};

    #[tokio::test]
    pub async fn marking_a_failed_block_registers_its_chain() {
        let pool = test_runner::get_pool().await;

        test_runner::run_test(&pool, |mut conn| async move {
            let chain = random_chain();

            CosmindexRepo::mark_failed_block(&mut conn, &chain, 42).await.unwrap();

            let saved_chain = find_chain(&mut conn, &chain.chain_id).await.unwrap();
            let failed_blocks =
                CosmindexRepo::get_failed_blocks(&mut conn, saved_chain.id).await.unwrap();
            assert_eq!(failed_blocks.len(), 1);
            assert_eq!(failed_blocks[0].height, 42);
        })
        .await;
    }

    #[tokio::test]
    pub async fn marking_twice_keeps_one_marker() {
        let pool = test_runner::get_pool().await;

        test_runner::run_test(&pool, |mut conn| async move {
            let chain = random_chain();

            CosmindexRepo::mark_failed_block(&mut conn, &chain, 8).await.unwrap();
            CosmindexRepo::mark_failed_block(&mut conn, &chain, 8).await.unwrap();

            let blockchain_id =
                CosmindexRepo::get_or_create_chain(&mut conn, &chain).await.unwrap();
            assert_eq!(
                CosmindexRepo::get_failed_blocks(&mut conn, blockchain_id).await.unwrap().len(),
                1
            );
        })
        .await;
    }

    #[tokio::test]
    pub async fn lists_failed_heights_in_ascending_order() {
        let pool = test_runner::get_pool().await;

        test_runner::run_test(&pool, |mut conn| async move {
            let chain = random_chain();
            for height in [30, 10, 20] {
                CosmindexRepo::mark_failed_block(&mut conn, &chain, height).await.unwrap();
                CosmindexRepo::mark_failed_event_block(&mut conn, &chain, height + 1)
                    .await
                    .unwrap();
            }
            let blockchain_id =
                CosmindexRepo::get_or_create_chain(&mut conn, &chain).await.unwrap();

            let failed_heights: Vec<_> = CosmindexRepo::get_failed_blocks(&mut conn, blockchain_id)
                .await
                .unwrap()
                .iter()
                .map(|b| b.height)
                .collect();
            let failed_event_heights: Vec<_> =
                CosmindexRepo::get_failed_event_blocks(&mut conn, blockchain_id)
                    .await
                    .unwrap()
                    .iter()
                    .map(|b| b.height)
                    .collect();

            assert_eq!(failed_heights, vec![10, 20, 30]);
            assert_eq!(failed_event_heights, vec![11, 21, 31]);
        })
        .await;
    }

    #[tokio::test]
    pub async fn markers_follow_the_block_lifecycle() {
        let pool = test_runner::get_pool().await;

        test_runner::run_test(&pool, |mut conn| async move {
            let chain = random_chain();
            let blockchain_id =
                CosmindexRepo::get_or_create_chain(&mut conn, &chain).await.unwrap();
            let block = block_at(blockchain_id, 77);

            CosmindexRepo::mark_failed_block(&mut conn, &chain, 77).await.unwrap();
            CosmindexRepo::mark_failed_event_block(&mut conn, &chain, 77).await.unwrap();

            CosmindexRepo::persist_block(&mut conn, &block, &[]).await.unwrap();
            assert!(CosmindexRepo::get_failed_blocks(&mut conn, blockchain_id)
                .await
                .unwrap()
                .is_empty());
            assert_eq!(
                CosmindexRepo::get_failed_event_blocks(&mut conn, blockchain_id)
                    .await
                    .unwrap()
                    .len(),
                1
            );

            CosmindexRepo::mark_block_events_indexed(&mut conn, &block).await.unwrap();
            assert!(CosmindexRepo::get_failed_event_blocks(&mut conn, blockchain_id)
                .await
                .unwrap()
                .is_empty());
        })
        .await;
    }

    #[tokio::test]
    pub async fn keeps_markers_of_other_chains() {
        let pool = test_runner::get_pool().await;

        test_runner::run_test(&pool, |mut conn| async move {
            let chain = random_chain();
            let other_chain = random_chain();
            let blockchain_id =
                CosmindexRepo::get_or_create_chain(&mut conn, &chain).await.unwrap();
            CosmindexRepo::mark_failed_block(&mut conn, &other_chain, 5).await.unwrap();

            CosmindexRepo::persist_block(&mut conn, &block_at(blockchain_id, 5), &[])
                .await
                .unwrap();

            let other_blockchain_id =
                CosmindexRepo::get_or_create_chain(&mut conn, &other_chain).await.unwrap();
            assert_eq!(
                CosmindexRepo::get_failed_blocks(&mut conn, other_blockchain_id)
                    .await
                    .unwrap()
                    .len(),
                1
            );
        })
        .await;
    }
}
