use diesel::sql_query;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::{ExecutesWithRawQuery, PostgresRepo, RepoError};

#[async_trait::async_trait]
impl ExecutesWithRawQuery for PostgresRepo {
    type RawQueryConn = AsyncPgConnection;

    async fn execute_raw_query(
        conn: &mut AsyncPgConnection,
        query: &str,
    ) -> Result<(), RepoError> {
        sql_query(query).execute(conn).await?;

        Ok(())
    }
}
