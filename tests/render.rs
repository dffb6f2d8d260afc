mod common;

use common::{TestWorkspace, as_of, employees};
use csv_enrich::{
    chart::{ChartSpec, ColorBy, ColorStrategy, PaletteEntry},
    derive::{self, DerivationRule, Strategy, TenureRule, ThresholdRule},
    error::Error,
    render::{self, MemorySink, RenderSession, SvgDirSink},
    table::Table,
};

fn enriched() -> Table {
    let mut table = employees();
    derive::derive_all(
        &mut table,
        &[
            DerivationRule::threshold(
                "high salary",
                ThresholdRule::new("salary", 7000.0),
                Strategy::ThresholdCompare,
            ),
            DerivationRule::tenure(
                "vacation days",
                TenureRule::vacation_days("hire date", as_of()),
            ),
        ],
    )
    .unwrap();
    table
}

fn salary_colors() -> ColorBy {
    ColorBy::new(
        "high salary",
        vec![
            PaletteEntry::new("yes", "#2ca02c"),
            PaletteEntry::new("no", "#d62728"),
        ],
    )
}

fn specs() -> Vec<ChartSpec> {
    vec![
        ChartSpec::bar("Salary by employee", "name", "salary"),
        ChartSpec::bar("High earners", "name", "salary").colored_by(salary_colors()),
        ChartSpec::pair(
            "Pairs",
            ["salary", "hire date", "vacation days"],
            "high salary",
        ),
    ]
}

#[test]
fn color_strategies_produce_identical_charts() {
    let table = enriched();
    let lookup = ChartSpec::bar("Colors", "name", "salary").colored_by(salary_colors());
    let conditional = ChartSpec::bar("Colors", "name", "salary")
        .colored_by(salary_colors().with_strategy(ColorStrategy::Conditional));
    let a = render::render(&table, &lookup).unwrap();
    let b = render::render(&table, &conditional).unwrap();
    assert_eq!(a.fills, vec!["#d62728", "#2ca02c", "#2ca02c"]);
    assert_eq!(a.svg, b.svg);
}

#[test]
fn bars_without_color_use_single_fill() {
    let table = enriched();
    let chart = render::render(&table, &specs()[0]).unwrap();
    assert_eq!(chart.kind, "bar");
    assert_eq!(chart.fills.len(), 3);
    assert!(chart.fills.iter().all(|fill| fill == &chart.fills[0]));
    assert!(chart.svg.contains("Salary by employee"));
}

#[test]
fn rendering_is_deterministic() {
    let table = enriched();
    let first = render::render_all(&table, &specs()).unwrap();
    let second = render::render_all(&table, &specs()).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
    assert_eq!(first[2].kind, "pair");
}

#[test]
fn rendering_does_not_mutate_the_table() {
    let table = enriched();
    let before = table.clone();
    render::render_all(&table, &specs()).unwrap();
    assert_eq!(table, before);
}

#[test]
fn missing_column_names_chart_and_column() {
    let table = employees();
    let spec = ChartSpec::bar("Vacation", "name", "vacation days");
    match render::render(&table, &spec) {
        Err(Error::Render { chart, message }) => {
            assert_eq!(chart, "Vacation");
            assert!(message.contains("vacation days"));
        }
        other => panic!("expected render error, got {other:?}"),
    }
}

#[test]
fn failed_batch_writes_nothing() {
    let table = enriched();
    let mut sink = MemorySink::default();
    let mut session = RenderSession::new(&mut sink);
    session.render(&table, &specs()[0]).unwrap();
    let broken = ChartSpec::bar("Names as heights", "salary", "name");
    assert!(session.render(&table, &broken).is_err());
    drop(session);
    assert!(sink.charts.is_empty());
}

#[test]
fn svg_sink_writes_numbered_files() {
    let workspace = TestWorkspace::new();
    let out = workspace.path().join("charts");
    let table = enriched();
    let mut session = RenderSession::new(SvgDirSink::new(&out));
    session.render_all(&table, &specs()).unwrap();
    assert_eq!(session.pending().len(), 3);
    let sink = session.flush().unwrap();
    let written = sink
        .written()
        .iter()
        .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    assert_eq!(
        written,
        vec![
            "01-salary-by-employee.svg",
            "02-high-earners.svg",
            "03-pairs.svg"
        ]
    );
    let svg = std::fs::read_to_string(out.join("02-high-earners.svg")).unwrap();
    assert!(svg.starts_with("<svg"));
    assert!(svg.contains("#2ca02c"));
}

#[test]
fn pair_chart_renders_empty_table() {
    let table = enriched();
    let empty = csv_enrich::filter::filter(
        &table,
        &csv_enrich::filter::FilterPredicate::parse(&["salary > 1000000"]).unwrap(),
    )
    .unwrap();
    let chart = render::render(&empty, &specs()[2]).unwrap();
    assert!(chart.svg.ends_with("</svg>\n"));
}

#[test]
fn pair_color_on_another_column_is_rejected() {
    let table = enriched();
    let spec = ChartSpec::pair("Pairs", ["salary", "vacation days"], "high salary")
        .colored_by(ColorBy::new("name", Vec::new()));
    let mut sink = MemorySink::default();
    let mut session = RenderSession::new(&mut sink);
    match session.render(&table, &spec) {
        Err(Error::Render { chart, message }) => {
            assert_eq!(chart, "Pairs");
            assert!(message.contains("high salary"), "{message}");
        }
        other => panic!("expected render error, got {other:?}"),
    }
    drop(session);
    assert!(sink.charts.is_empty());
}
