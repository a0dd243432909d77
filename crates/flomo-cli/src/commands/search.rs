use crate::cli::PageArgs;
use crate::commands::common::{normalize_search_query, open_local, print_page};
use crate::config::Settings;
use crate::error::CliError;

pub async fn run_search(
    query: &str,
    page: PageArgs,
    as_json: bool,
    settings: &Settings,
) -> Result<(), CliError> {
    let normalized_query = normalize_search_query(query)?;
    let service = open_local(settings).await?;
    let result = service
        .search_notes(
            &normalized_query,
            page.order_by.as_str(),
            page.order_dir.as_str(),
            page.offset,
            page.limit,
        )
        .await?;

    print_page(&result, as_json)
}
