//! End-to-end rendering of computed returns.

use albany_analytics::returns::calc_returns;
use albany_analytics::{AllocatedPrice, Month};
use albany_output::{ExportFormat, Exporter, Report, ReportBuilder};

fn allocated(asset: &str, weight: f64, prices: &[f64]) -> Vec<AllocatedPrice> {
    let mut date: Month = "2020-01".parse().unwrap();
    prices
        .iter()
        .map(|&p| {
            let row = AllocatedPrice {
                portfolio_id: "PF_01".to_string(),
                asset_id: asset.to_string(),
                date,
                asset_weight: weight,
                asset_price: Some(p),
            };
            date = date.succ();
            row
        })
        .collect()
}

#[test]
fn test_returns_export_and_report() {
    let mut rows = allocated("^GSPC", 0.5, &[100.0, 110.0, 121.0]);
    rows.extend(allocated("^FTSE", 0.5, &[50.0, 55.0, 60.5]));
    let tables = calc_returns(&rows).unwrap();
    assert_eq!(tables.portfolio.len(), 3);

    let csv = tables.portfolio.export_to_string(ExportFormat::Csv).unwrap();
    assert_eq!(csv.lines().count(), 4);
    assert!(csv.lines().nth(1).unwrap().starts_with("PF_01,2020-01,75.0,,"));

    let report = ReportBuilder::new()
        .kind("returns")
        .subject("PF_01")
        .contents(&tables.portfolio)
        .unwrap()
        .build()
        .unwrap();
    let json = report.to_json().unwrap();
    assert!(json.contains("\"kind\": \"returns\""));
    assert!(json.contains("\"pct_return\""));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("returns.json");
    report.write_to(&path).unwrap();
    let written: Report = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written.subject, "PF_01");
    assert_eq!(written.contents.as_array().map(Vec::len), Some(3));
}
