//! Terminal summaries for preview and migration results.

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use crm_model::{
    MappingEntry, MatchMethod, MigrationMapping, MigrationRun, ReadinessLevel, ReadinessReport,
    RunStage, StageCounters,
};

use crate::commands::PreviewResult;

pub fn print_preview(result: &PreviewResult) {
    print_mapping_table(&result.mapping);
    print_readiness(&result.readiness);
}

pub fn print_run(run: &MigrationRun) {
    println!("Run: {}", run.id);
    println!("Stage: {}", run.stage);
    if let Some(readiness) = &run.readiness {
        print_readiness(readiness);
    }

    let mut table = Table::new();
    apply_style(&mut table);
    table.set_header(vec![
        header_cell("Stage"),
        header_cell("Attempted"),
        header_cell("Succeeded"),
        header_cell("Failed"),
        header_cell("Skipped"),
    ]);
    for column in 1..=4 {
        if let Some(column) = table.column_mut(column) {
            column.set_cell_alignment(CellAlignment::Right);
        }
    }
    table.add_row(counter_row("Contacts", &run.contacts));
    table.add_row(counter_row("Opportunities", &run.opportunities));
    println!("{table}");

    println!(
        "Contacts translated: {} ({} reused)",
        run.contact_translations.len(),
        run.contact_translations.reused_count()
    );
    println!(
        "Opportunities recorded: {} ({} created)",
        run.opportunity_results.len(),
        run.opportunity_results.created_count()
    );

    if !run.warnings.is_empty() {
        println!("Warnings:");
        for warning in &run.warnings {
            println!("- {warning}");
        }
    }
    if !run.recent_failures.is_empty() {
        eprintln!("Recent failures:");
        for failure in &run.recent_failures {
            eprintln!("- {failure}");
        }
    }
    if let Some(failure) = &run.failure {
        eprintln!("Run failed: {failure}");
    } else if run.stage == RunStage::Scoring {
        println!(
            "Halted at scoring: readiness is LOW. Re-run with --allow-low-readiness to proceed."
        );
    }
}

fn print_readiness(report: &ReadinessReport) {
    let mut table = Table::new();
    apply_style(&mut table);
    table.set_header(vec![header_cell("Readiness"), header_cell("Score")]);
    if let Some(column) = table.column_mut(1) {
        column.set_cell_alignment(CellAlignment::Right);
    }
    table.add_row(vec![Cell::new("Fields"), percent_cell(report.field_readiness)]);
    table.add_row(vec![
        Cell::new("Pipelines"),
        percent_cell(report.pipeline_readiness),
    ]);
    table.add_row(vec![Cell::new("Stages"), percent_cell(report.stage_readiness)]);
    table.add_row(vec![
        Cell::new("Overall").add_attribute(Attribute::Bold),
        percent_cell(report.overall).add_attribute(Attribute::Bold),
    ]);
    println!("{table}");
    let (label, color) = match report.level {
        ReadinessLevel::High => ("HIGH", Color::Green),
        ReadinessLevel::Medium => ("MEDIUM", Color::Yellow),
        ReadinessLevel::Low => ("LOW", Color::Red),
    };
    let mut level_table = Table::new();
    apply_style(&mut level_table);
    level_table.add_row(vec![
        Cell::new("Readiness level"),
        Cell::new(label).fg(color).add_attribute(Attribute::Bold),
    ]);
    println!("{level_table}");
    for warning in &report.warnings {
        println!("! {warning}");
    }
}

fn print_mapping_table(mapping: &MigrationMapping) {
    let mut table = Table::new();
    apply_style(&mut table);
    table.set_header(vec![
        header_cell("Kind"),
        header_cell("Exact"),
        header_cell("Alias"),
        header_cell("Similarity"),
        header_cell("Unresolved"),
    ]);
    for column in 1..=4 {
        if let Some(column) = table.column_mut(column) {
            column.set_cell_alignment(CellAlignment::Right);
        }
    }
    table.add_row(method_row("Fields", &mapping.fields));
    table.add_row(method_row("Pipelines", &mapping.pipelines));
    table.add_row(method_row("Stages", &mapping.stages));
    println!("{table}");
}

fn method_row(label: &str, entries: &[MappingEntry]) -> Vec<Cell> {
    let count =
        |method: MatchMethod| entries.iter().filter(|entry| entry.method == method).count();
    let unresolved = count(MatchMethod::Unresolved);
    vec![
        Cell::new(label),
        Cell::new(count(MatchMethod::Exact)),
        Cell::new(count(MatchMethod::Alias)),
        Cell::new(count(MatchMethod::Similarity)),
        if unresolved > 0 {
            Cell::new(unresolved).fg(Color::Yellow)
        } else {
            Cell::new(unresolved)
        },
    ]
}

fn counter_row(label: &str, counters: &StageCounters) -> Vec<Cell> {
    vec![
        Cell::new(label),
        Cell::new(counters.attempted),
        Cell::new(counters.succeeded),
        if counters.failed > 0 {
            Cell::new(counters.failed).fg(Color::Red)
        } else {
            Cell::new(counters.failed)
        },
        if counters.skipped > 0 {
            Cell::new(counters.skipped).fg(Color::Yellow)
        } else {
            Cell::new(counters.skipped)
        },
    ]
}

fn header_cell(text: &str) -> Cell {
    Cell::new(text)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn percent_cell(ratio: f32) -> Cell {
    Cell::new(format!("{:.1}%", ratio * 100.0))
}

fn apply_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
}
