//! Tabular report handler

use crate::cli::output::print_report;
use crate::cli::output::print_report_list;
use crate::database::Database;
use crate::reports::generate_report;
use crate::reports::list_reports;
use crate::reports::ReportKind;
use crate::Result;

/// List reports when `name` is `None`, otherwise generate that report
pub async fn handle_report_command(db: &Database, name: Option<&str>, json: bool) -> Result<()> {
    let Some(name) = name else {
        let reports = list_reports();
        if json {
            println!("{}", serde_json::to_string_pretty(&reports)?);
        } else {
            print_report_list(&reports);
        }
        return Ok(());
    };

    let kind: ReportKind = name.parse()?;
    let report = generate_report(db, kind).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}
