use crate::cli::PageArgs;
use crate::commands::common::{open_local, print_page};
use crate::config::Settings;
use crate::error::CliError;

pub async fn run_list(page: PageArgs, as_json: bool, settings: &Settings) -> Result<(), CliError> {
    let service = open_local(settings).await?;
    let result = service
        .list_notes(
            page.order_by.as_str(),
            page.order_dir.as_str(),
            page.offset,
            page.limit,
        )
        .await?;

    print_page(&result, as_json)
}
