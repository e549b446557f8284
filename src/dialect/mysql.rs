use super::{Dialect, SqlParams};

/// MySQL / MariaDB. `LIMIT offset,size` pagination, `ON DUPLICATE KEY UPDATE` upserts.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn paginate(&self, params: &SqlParams) -> String {
        let page = params.page_row.unwrap_or_default();
        format!(
            "{} LIMIT {},{}",
            self.select(params),
            page.offset(),
            page.page_size
        )
    }
}
