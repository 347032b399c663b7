use chrono::NaiveDate;
use freelance_core::{
    config::Defaults,
    core::services::{DocumentService, ProjectService},
    domain::{Client, Entry, FixedEntry, RateEntry, ReferenceEntry, WorkDuration},
    export::{DocumentExport, NumberFormat},
    storage::{JsonStorage, StorageBackend},
};
use rust_decimal::Decimal;
use tempfile::tempdir;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn offer_to_invoice_workflow() {
    let temp = tempdir().unwrap();
    let storage = JsonStorage::new(Some(temp.path().to_path_buf()), None).unwrap();

    let mut defaults = Defaults::default();
    defaults.wage = Decimal::new(50, 0);
    defaults.hours_per_day = 6;
    defaults.tax_percent = Decimal::new(19, 0);

    let mut preset = Entry::from(RateEntry::new(
        "Page",
        Decimal::ONE,
        WorkDuration::from_hms(2, 0, 0),
    ));
    defaults.stamp_entry(&mut preset);
    storage.save_entry_preset(&preset).unwrap();

    let client = Client::new("Katherine", "Johnson");
    let mut project = ProjectService::create(&client, "Orbit", &defaults).unwrap();
    let offer_id =
        ProjectService::new_offer(&mut project, "Orbit site", date(2024, 3, 4), &defaults);

    let offer = project.offer_mut(offer_id).unwrap();
    let page = storage.load_entry_preset("Page").unwrap();
    let pages = DocumentService::add_preset_entry(offer, &page);
    DocumentService::update_entry(offer, pages, |entry| {
        let _ = entry.header_mut().set_amount("3");
    })
    .unwrap();
    let mut hosting = Entry::from(FixedEntry::new(
        "Hosting",
        WorkDuration::ZERO,
        Decimal::new(12000, 2),
    ));
    defaults.stamp_entry(&mut hosting);
    offer.add_entry(hosting);
    let fee = offer.add_entry(Entry::from(ReferenceEntry::new(
        "Project management",
        Decimal::ONE,
        Decimal::new(1, 1),
        false,
    )));
    let refused = DocumentService::connect(offer, fee, &[pages]).unwrap();
    assert!(refused.is_empty());

    let summary =
        DocumentService::summarize(project.offer(offer_id).unwrap(), Some(&project)).unwrap();
    assert_eq!(summary.net, Decimal::new(45000, 2));
    assert_eq!(summary.tax, Decimal::new(7980, 2));
    assert_eq!(summary.gross, Decimal::new(52980, 2));
    assert_eq!(summary.time, WorkDuration::from_hms(6, 0, 0));
    assert_eq!(summary.finish_date, Some(date(2024, 3, 5)));

    let invoice_id =
        DocumentService::convert_to_invoice(&mut project, offer_id, date(2024, 3, 29), 14).unwrap();
    storage.save_client(&client).unwrap();
    storage.save_project(&client, &project).unwrap();

    let reloaded = storage.load_project(&client, "Orbit").unwrap();
    let invoice = reloaded.invoice(invoice_id).unwrap();
    let export = DocumentExport::build(invoice, Some(&reloaded)).unwrap();
    assert_eq!(export.kind, "Invoice");
    assert_eq!(export.due_date, Some(date(2024, 4, 12)));
    assert_eq!(export.rows.len(), 3);
    assert_eq!(export.rows[0].tax_percent, "19");
    assert_eq!(export.rows[2].price, Decimal::new(3000, 2));
    assert_eq!(export.summary.gross, summary.gross);

    let lines = export.total_lines(&NumberFormat::default());
    assert_eq!(lines[2].1, "529.80 EUR");
    assert_eq!(
        ProjectService::outstanding(&reloaded).unwrap(),
        Decimal::new(52980, 2)
    );
}
