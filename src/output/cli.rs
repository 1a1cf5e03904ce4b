use crate::model::{ScanOutcome, ScanResult, SecurityReport, SkippedDependency, UpdateRecord, Vulnerability};
use crate::specifier::Specifier;
use crate::version::UpdateKind;
use anyhow::Result;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct DependencyRow {
    #[tabled(rename = "Package")]
    name: String,
    #[tabled(rename = "Constraint")]
    constraint: String,
}

#[derive(Tabled)]
struct UpdateRow {
    #[tabled(rename = "Package")]
    package: String,
    #[tabled(rename = "Specified")]
    specifier: String,
    #[tabled(rename = "Latest")]
    latest: String,
    #[tabled(rename = "Type")]
    update_type: String,
}

#[derive(Tabled)]
struct VulnRow {
    #[tabled(rename = "Package")]
    package: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Fix Versions")]
    fix_versions: String,
    #[tabled(rename = "Description")]
    description: String,
}

#[derive(Tabled)]
struct SkippedRow {
    #[tabled(rename = "Dependency")]
    declaration: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

pub fn dependencies_table(dependencies: &[String]) -> String {
    let rows: Vec<DependencyRow> = dependencies
        .iter()
        .map(|declaration| {
            let spec = Specifier::parse(declaration);
            let constraint = match (&spec.url, spec.clauses.is_empty()) {
                (Some(url), _) => truncate(url, 50),
                (None, true) => "-".to_string(),
                (None, false) => spec.clauses_string(),
            };
            DependencyRow {
                name: spec.name,
                constraint,
            }
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn updates_table(updates: &[UpdateRecord]) -> String {
    let rows: Vec<UpdateRow> = updates
        .iter()
        .map(|u| UpdateRow {
            package: u.package.clone(),
            specifier: u.specifier.clone(),
            latest: u.latest_version.clone(),
            update_type: format_update_kind(update_kind(u)),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn vulnerabilities_table(vulnerabilities: &[Vulnerability]) -> String {
    let rows: Vec<VulnRow> = vulnerabilities
        .iter()
        .map(|v| VulnRow {
            package: v.package.clone(),
            version: v.version.clone(),
            id: v.id.clone(),
            fix_versions: if v.fix_versions.is_empty() {
                "-".to_string()
            } else {
                v.fix_versions.join(", ")
            },
            description: v
                .description
                .as_deref()
                .map(|d| truncate(d.lines().next().unwrap_or_default(), 60))
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

fn skipped_table(skipped: &[SkippedDependency]) -> String {
    let rows: Vec<SkippedRow> = skipped
        .iter()
        .map(|s| SkippedRow {
            declaration: truncate(&s.declaration, 50),
            reason: s.reason.to_string(),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn print_cli_table(result: &ScanResult) -> Result<()> {
    println!();
    println!("Repository: {} ({})", result.repository, result.branch);
    println!(
        "Scan completed at: {}",
        result.scan_time.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!();

    if result.dependencies.is_empty() {
        println!("No direct dependencies found in pyproject.toml or requirements.txt.");
        return Ok(());
    }

    println!("Found {} direct dependencies:", result.dependencies.len());
    println!();
    println!("{}", dependencies_table(&result.dependencies));

    if let Some(report) = &result.updates {
        println!();
        if report.updates.is_empty() {
            println!("All dependencies are up-to-date!");
        } else {
            println!("Available updates ({}):", report.updates.len());
            println!();
            println!("{}", updates_table(&report.updates));
        }
    }

    if let Some(report) = &result.security {
        println!();
        print_security(report);
    }

    let skipped: Vec<SkippedDependency> = result
        .updates
        .iter()
        .flat_map(|r| r.skipped.iter())
        .chain(result.security.iter().flat_map(|r| r.skipped.iter()))
        .filter(|s| !matches!(s.reason, crate::model::SkipReason::Unversioned))
        .cloned()
        .collect();
    if !skipped.is_empty() {
        println!();
        println!("Skipped ({}):", skipped.len());
        println!();
        println!("{}", skipped_table(&skipped));
    }

    println!();
    print_summary(result);

    Ok(())
}

fn print_security(report: &SecurityReport) {
    match &report.outcome {
        ScanOutcome::Failed { reason } => {
            println!("Error: The security scan could not be completed ({}).", reason);
        }
        ScanOutcome::Clean => {
            println!("No vulnerabilities found in {} scanned packages.", report.submitted.len());
        }
        ScanOutcome::Found { vulnerabilities } => {
            println!("Found {} vulnerabilities:", vulnerabilities.len());
            println!();
            println!("{}", vulnerabilities_table(vulnerabilities));
        }
    }
}

fn print_summary(result: &ScanResult) {
    println!("Summary:");
    println!("  Direct dependencies: {}", result.dependencies.len());

    if let Some(report) = &result.updates {
        let major = report
            .updates
            .iter()
            .filter(|u| update_kind(u) == UpdateKind::Major)
            .count();
        if major > 0 {
            println!("  Outdated: {} ({} major updates)", report.updates.len(), major);
        } else {
            println!("  Outdated: {}", report.updates.len());
        }
    }

    if let Some(report) = &result.security {
        match report.vulnerabilities() {
            Some(vulns) => println!("  Vulnerabilities: {}", vulns.len()),
            None => println!("  Vulnerabilities: scan failed"),
        }
    }
}

/// Compares the first declared clause against the latest release.
fn update_kind(update: &UpdateRecord) -> UpdateKind {
    let declared = Specifier::parse(&format!("{}{}", update.package, update.specifier))
        .constraint()
        .map(|c| c.version.clone())
        .unwrap_or_default();
    UpdateKind::classify(&declared, &update.latest_version)
}

fn format_update_kind(kind: UpdateKind) -> String {
    match kind {
        UpdateKind::Major => format!("\x1b[31m{}\x1b[0m", kind.as_str().to_uppercase()),
        UpdateKind::Minor => format!("\x1b[33m{}\x1b[0m", kind.as_str()),
        UpdateKind::Patch => kind.as_str().to_string(),
        UpdateKind::Other => "-".to_string(),
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}
