use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use pbix_core::{
    Diagnostic, ExtractReport, PackReport, PackageSummary, PartOutcome, PartStatus, SETTINGS,
    Severity,
};

use crate::commands::RunOutcome;

pub fn print_extract_summary(outcome: &RunOutcome<ExtractReport>) {
    let report = &outcome.report;
    println!("Package: {}", report.package.display());
    println!("Project: {}", report.project.display());
    println!("Version: {}", report.version);
    if report.source_unchanged {
        println!("Source unchanged since the last extraction");
    }
    print_parts_table(&report.parts);

    let stability = &report.stability;
    println!(
        "Identifiers: {} restored, {} unchanged, {} new, {} re-baselined",
        stability.rewritten, stability.unchanged, stability.baselined, stability.rebaselined
    );
    println!(
        "Files: {} written ({} replaced), {} removed in {} ms",
        report.commit.written, report.commit.replaced, report.commit.removed, outcome.elapsed_ms
    );
    print_diagnostics(&outcome.diagnostics);
}

pub fn print_pack_summary(outcome: &RunOutcome<PackReport>) {
    let report = &outcome.report;
    println!("Project: {}", report.project.display());
    println!("Package: {}", report.package.display());
    println!("Version: {}", report.version);
    print_parts_table(&report.parts);
    println!(
        "Parts: {} written in {} ms",
        report.part_count(),
        outcome.elapsed_ms
    );
    print_diagnostics(&outcome.diagnostics);
}

pub fn print_package_summary(summary: &PackageSummary) {
    match &summary.version {
        Some(version) if summary.supported => println!("Version: {version}"),
        Some(version) => println!("Version: {version} (unsupported)"),
        None => println!("Version: missing"),
    }
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Part"),
        header_cell("Role"),
        header_cell("Content type"),
        header_cell("Size"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 3, CellAlignment::Right);
    let mut total = 0u64;
    for part in &summary.parts {
        total += part.size;
        table.add_row(vec![
            Cell::new(&part.name),
            Cell::new(&part.role),
            match &part.content_type {
                Some(content_type) => Cell::new(content_type),
                None => dim_cell("-"),
            },
            Cell::new(part.size),
        ]);
    }
    table.add_row(vec![
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        Cell::new(format!("{} parts", summary.parts.len())),
        dim_cell("-"),
        Cell::new(total).add_attribute(Attribute::Bold),
    ]);
    println!("{table}");
}

pub fn print_settings() {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Variable"),
        header_cell("Setting"),
        header_cell("Description"),
    ]);
    apply_table_style(&mut table);
    for def in SETTINGS {
        table.add_row(vec![
            Cell::new(def.variable).fg(Color::Green),
            Cell::new(def.field),
            Cell::new(def.description),
        ]);
    }
    println!("{table}");
}

fn print_parts_table(parts: &[PartOutcome]) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Part"),
        header_cell("Project file"),
        header_cell("Status"),
        header_cell("Detail"),
    ]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 2, CellAlignment::Center);
    for part in parts {
        table.add_row(vec![
            Cell::new(&part.part),
            match &part.tree_path {
                Some(path) => Cell::new(path),
                None => dim_cell("-"),
            },
            status_cell(&part.status),
            match part.status.reason() {
                Some(reason) => Cell::new(reason),
                None => dim_cell(""),
            },
        ]);
    }
    println!("{table}");
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    let warnings: Vec<&Diagnostic> = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Warning)
        .collect();
    if warnings.is_empty() {
        return;
    }
    println!("Warnings: {}", warnings.len());
    for warning in warnings {
        match &warning.subject {
            Some(subject) => println!("  - {subject}: {}", warning.message),
            None => println!("  - {}", warning.message),
        }
    }
}

fn status_cell(status: &PartStatus) -> Cell {
    let color = match status {
        PartStatus::Decoded | PartStatus::Encoded => Color::Green,
        PartStatus::Preserved => Color::Blue,
        PartStatus::Skipped { .. } => Color::Yellow,
        PartStatus::Failed { .. } => Color::Red,
    };
    Cell::new(status.label()).fg(color)
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(140);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
