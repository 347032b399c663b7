//! Billable line items and the rules that price them.
//!
//! Every entry is evaluated against its sibling list: a [`ReferenceEntry`]
//! stores only the ids of the entries it scales off and resolves them at
//! computation time, so removing an entry from a document simply leaves a
//! dangling id that contributes nothing.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::{
    common::{Displayable, Identifiable, NamedEntity},
    duration::WorkDuration,
    money::{parse_decimal, round_money, saturating_div, Edit},
};

const DEFAULT_AMOUNT_FORMAT: &str = "{s}";

/// Fields shared by every entry variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryHeader {
    id: Uuid,
    pub title: String,
    pub comment: String,
    pub amount: Decimal,
    pub amount_format: String,
    #[serde(alias = "tax")]
    pub tax_percent: Decimal,
}

impl Default for EntryHeader {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            title: String::new(),
            comment: String::new(),
            amount: Decimal::ZERO,
            amount_format: DEFAULT_AMOUNT_FORMAT.into(),
            tax_percent: Decimal::ZERO,
        }
    }
}

impl EntryHeader {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn set_amount(&mut self, raw: &str) -> Edit {
        Edit::apply(&mut self.amount, parse_decimal(raw))
    }

    pub fn set_tax(&mut self, raw: &str) -> Edit {
        Edit::apply(&mut self.tax_percent, parse_decimal(raw))
    }

    fn refresh_id(&mut self) {
        self.id = Uuid::new_v4();
    }
}

/// Entry with an authored time and price ("BaseEntry").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedEntry {
    #[serde(flatten)]
    pub header: EntryHeader,
    pub time: WorkDuration,
    pub price: Decimal,
}

impl FixedEntry {
    pub fn new(title: impl Into<String>, time: WorkDuration, price: Decimal) -> Self {
        Self {
            header: EntryHeader::new(title),
            time,
            price,
        }
    }

    pub fn set_price(&mut self, raw: &str) -> Edit {
        Edit::apply(&mut self.price, parse_decimal(raw))
    }

    pub fn set_time(&mut self, raw: &str) -> Edit {
        Edit::apply(&mut self.time, WorkDuration::parse(raw))
    }
}

/// Entry whose time is `amount × hour_rate` ("MultiplyEntry").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateEntry {
    #[serde(flatten)]
    pub header: EntryHeader,
    pub hour_rate: WorkDuration,
}

impl RateEntry {
    pub fn new(title: impl Into<String>, amount: Decimal, hour_rate: WorkDuration) -> Self {
        let mut header = EntryHeader::new(title);
        header.amount = amount;
        Self { header, hour_rate }
    }

    pub fn set_hour_rate(&mut self, raw: &str) -> Edit {
        Edit::apply(&mut self.hour_rate, WorkDuration::parse(raw))
    }

    pub fn time(&self) -> WorkDuration {
        self.hour_rate.scale(self.header.amount)
    }
}

/// Entry that scales off the time or price of other entries ("ConnectEntry").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceEntry {
    #[serde(flatten)]
    pub header: EntryHeader,
    pub multiplicator: Decimal,
    pub is_time: bool,
    connected: BTreeSet<Uuid>,
}

impl Default for ReferenceEntry {
    fn default() -> Self {
        Self {
            header: EntryHeader::default(),
            multiplicator: Decimal::ZERO,
            is_time: false,
            connected: BTreeSet::new(),
        }
    }
}

impl ReferenceEntry {
    pub fn new(
        title: impl Into<String>,
        amount: Decimal,
        multiplicator: Decimal,
        is_time: bool,
    ) -> Self {
        let mut header = EntryHeader::new(title);
        header.amount = amount;
        Self {
            header,
            multiplicator,
            is_time,
            connected: BTreeSet::new(),
        }
    }

    pub fn set_multiplicator(&mut self, raw: &str) -> Edit {
        Edit::apply(&mut self.multiplicator, parse_decimal(raw))
    }

    pub fn connected(&self) -> &BTreeSet<Uuid> {
        &self.connected
    }

    pub fn is_connected(&self, id: Uuid) -> bool {
        self.connected.contains(&id)
    }

    /// Adds `target` to the referenced set after validating it against `siblings`.
    ///
    /// Connecting an already-connected target succeeds without change.
    pub fn connect(&mut self, siblings: &[Entry], target: Uuid) -> Result<(), ConnectError> {
        check_connection(siblings, self.header.id, target)?;
        self.connect_unchecked(target);
        Ok(())
    }

    pub(crate) fn connect_unchecked(&mut self, target: Uuid) {
        self.connected.insert(target);
    }

    /// Removes `target` from the referenced set; returns whether it was present.
    pub fn disconnect(&mut self, target: Uuid) -> bool {
        self.connected.remove(&target)
    }

    pub fn disconnect_all(&mut self) {
        self.connected.clear();
    }
}

/// Reasons a reference connection is refused. The entry is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("an entry cannot reference itself")]
    SelfReference,
    #[error("entry {0} is not part of this document")]
    UnknownEntry(Uuid),
    #[error("entry {0} already references this entry")]
    Cycle(Uuid),
    #[error("entry {0} cannot hold references")]
    NotReference(Uuid),
}

/// Validates that `source` may reference `target` within `siblings`.
///
/// Only the direct back edge is checked: the target must not already hold
/// `source` in its own referenced set.
pub fn check_connection(siblings: &[Entry], source: Uuid, target: Uuid) -> Result<(), ConnectError> {
    if source == target {
        return Err(ConnectError::SelfReference);
    }
    let target_entry = siblings
        .iter()
        .find(|entry| entry.id() == target)
        .ok_or(ConnectError::UnknownEntry(target))?;
    match target_entry {
        Entry::Reference(reference) if reference.is_connected(source) => {
            Err(ConnectError::Cycle(target))
        }
        _ => Ok(()),
    }
}

/// A billable line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Entry {
    #[serde(rename = "BaseEntry")]
    Fixed(FixedEntry),
    #[serde(rename = "MultiplyEntry")]
    Rate(RateEntry),
    #[serde(rename = "ConnectEntry")]
    Reference(ReferenceEntry),
}

impl Entry {
    pub fn header(&self) -> &EntryHeader {
        match self {
            Entry::Fixed(entry) => &entry.header,
            Entry::Rate(entry) => &entry.header,
            Entry::Reference(entry) => &entry.header,
        }
    }

    pub fn header_mut(&mut self) -> &mut EntryHeader {
        match self {
            Entry::Fixed(entry) => &mut entry.header,
            Entry::Rate(entry) => &mut entry.header,
            Entry::Reference(entry) => &mut entry.header,
        }
    }

    pub fn id(&self) -> Uuid {
        self.header().id
    }

    pub fn title(&self) -> &str {
        &self.header().title
    }

    pub fn amount(&self) -> Decimal {
        self.header().amount
    }

    pub fn tax_percent(&self) -> Decimal {
        self.header().tax_percent
    }

    /// Variant tag used in persisted records.
    pub fn kind_label(&self) -> &'static str {
        match self {
            Entry::Fixed(_) => "BaseEntry",
            Entry::Rate(_) => "MultiplyEntry",
            Entry::Reference(_) => "ConnectEntry",
        }
    }

    pub fn as_reference(&self) -> Option<&ReferenceEntry> {
        match self {
            Entry::Reference(entry) => Some(entry),
            _ => None,
        }
    }

    pub fn as_reference_mut(&mut self) -> Option<&mut ReferenceEntry> {
        match self {
            Entry::Reference(entry) => Some(entry),
            _ => None,
        }
    }

    /// Time of this entry. Reference entries resolve their ids against `siblings`.
    pub fn time(&self, siblings: &[Entry]) -> WorkDuration {
        self.time_guarded(siblings, &mut Vec::new())
    }

    /// Pre-tax price of this entry at `wage`, rounded to cents.
    pub fn price(&self, siblings: &[Entry], wage: Decimal) -> Decimal {
        self.price_guarded(siblings, wage, &mut Vec::new())
    }

    pub fn price_tax(&self, siblings: &[Entry], wage: Decimal) -> Decimal {
        let price = self.price(siblings, wage);
        round_money(price.saturating_mul(self.tax_percent()) / Decimal::ONE_HUNDRED)
    }

    /// Price of a single unit of `amount`; zero when there is no amount.
    pub fn unit_price(&self, siblings: &[Entry], wage: Decimal) -> Decimal {
        let amount = self.amount();
        if amount.is_zero() {
            return Decimal::ZERO;
        }
        round_money(saturating_div(self.price(siblings, wage), amount))
    }

    /// Deep copy; a fresh id is minted unless `keep_id` is set.
    pub fn copy(&self, keep_id: bool) -> Entry {
        let mut copy = self.clone();
        if !keep_id {
            copy.header_mut().refresh_id();
        }
        copy
    }

    pub fn to_record(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }

    /// Rebuilds an entry from a tagged record.
    ///
    /// With `preset_loading` the stored id is discarded and a new one minted.
    pub fn from_record(record: serde_json::Value, preset_loading: bool) -> serde_json::Result<Entry> {
        let mut entry: Entry = serde_json::from_value(record)?;
        if preset_loading {
            entry.header_mut().refresh_id();
        }
        Ok(entry)
    }

    // `visiting` holds the reference entries on the current evaluation path;
    // re-entering one of them contributes zero.
    fn time_guarded(&self, siblings: &[Entry], visiting: &mut Vec<Uuid>) -> WorkDuration {
        match self {
            Entry::Fixed(entry) => entry.time,
            Entry::Rate(entry) => entry.time(),
            Entry::Reference(entry) => {
                if !entry.is_time {
                    return WorkDuration::ZERO;
                }
                let id = entry.header.id;
                if visiting.contains(&id) {
                    return WorkDuration::ZERO;
                }
                visiting.push(id);
                let sum: WorkDuration = resolve(siblings, &entry.connected)
                    .map(|target| {
                        target
                            .time_guarded(siblings, visiting)
                            .scale(entry.multiplicator)
                    })
                    .sum();
                visiting.pop();
                sum.scale(entry.header.amount)
            }
        }
    }

    fn price_guarded(&self, siblings: &[Entry], wage: Decimal, visiting: &mut Vec<Uuid>) -> Decimal {
        match self {
            Entry::Fixed(entry) => entry.price,
            Entry::Rate(entry) => round_money(entry.time().hours().saturating_mul(wage)),
            Entry::Reference(entry) if entry.is_time => round_money(
                self.time_guarded(siblings, visiting)
                    .hours()
                    .saturating_mul(wage),
            ),
            Entry::Reference(entry) => {
                let id = entry.header.id;
                if visiting.contains(&id) {
                    return Decimal::ZERO;
                }
                visiting.push(id);
                let sum = resolve(siblings, &entry.connected)
                    .map(|target| {
                        entry
                            .multiplicator
                            .saturating_mul(target.price_guarded(siblings, wage, visiting))
                    })
                    .fold(Decimal::ZERO, Decimal::saturating_add);
                visiting.pop();
                round_money(sum.saturating_mul(entry.header.amount))
            }
        }
    }
}

fn resolve<'a>(
    siblings: &'a [Entry],
    ids: &'a BTreeSet<Uuid>,
) -> impl Iterator<Item = &'a Entry> + 'a {
    siblings.iter().filter(move |entry| ids.contains(&entry.id()))
}

impl Identifiable for Entry {
    fn id(&self) -> Uuid {
        Entry::id(self)
    }
}

impl NamedEntity for Entry {
    fn name(&self) -> &str {
        self.title()
    }
}

impl Displayable for Entry {
    fn display_label(&self) -> String {
        format!("{} [{}]", self.title(), self.kind_label())
    }
}

impl From<FixedEntry> for Entry {
    fn from(entry: FixedEntry) -> Self {
        Entry::Fixed(entry)
    }
}

impl From<RateEntry> for Entry {
    fn from(entry: RateEntry) -> Self {
        Entry::Rate(entry)
    }
}

impl From<ReferenceEntry> for Entry {
    fn from(entry: ReferenceEntry) -> Self {
        Entry::Reference(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(raw: &str) -> Decimal {
        raw.parse().expect("decimal literal")
    }

    fn fixed(title: &str, hours: &str, price: &str) -> Entry {
        FixedEntry::new(title, WorkDuration::from_hours(d(hours)), d(price)).into()
    }

    #[test]
    fn rate_entry_multiplies_amount_by_hour_rate() {
        let entry: Entry =
            RateEntry::new("Coding", d("2.0"), WorkDuration::parse_or_zero("0:30")).into();
        assert_eq!(entry.time(&[]), WorkDuration::from_hms(1, 0, 0));
        assert_eq!(entry.price(&[], d("50.00")), d("50.00"));
    }

    #[test]
    fn huge_amounts_saturate_instead_of_overflowing() {
        let mut entry: Entry =
            RateEntry::new("Bulk", d("1"), WorkDuration::from_hms(1, 0, 0)).into();
        assert!(entry.header_mut().set_amount("10000000000000000").is_applied());
        assert_eq!(entry.time(&[]).seconds(), i64::MAX);
        assert!(entry.price(&[], d("50")) > Decimal::ZERO);

        assert!(entry
            .header_mut()
            .set_amount("79228162514264337593543950335")
            .is_applied());
        assert_eq!(entry.time(&[]).seconds(), i64::MAX);
        assert_eq!(entry.price(&[], Decimal::MAX), Decimal::MAX);
        assert!(entry.header_mut().set_tax("19").is_applied());
        assert!(entry.price_tax(&[], Decimal::MAX) > Decimal::ZERO);

        let base = fixed("Base", "1", "50");
        let mut scaled = ReferenceEntry::new("Scaled", Decimal::MAX, Decimal::MAX, false);
        scaled.connect(&[base.clone()], base.id()).expect("connect");
        let siblings = vec![base, Entry::from(scaled)];
        assert_eq!(siblings[1].price(&siblings, d("50")), Decimal::MAX);
        assert_eq!(siblings[1].unit_price(&siblings, d("50")), d("1"));
    }

    #[test]
    fn fixed_entry_ignores_wage() {
        let entry = fixed("Setup", "1.0", "50.00");
        for wage in ["0", "12.5", "999"] {
            assert_eq!(entry.price(&[], d(wage)), d("50.00"));
        }
        assert_eq!(entry.time(&[]), WorkDuration::from_hms(1, 0, 0));
    }

    #[test]
    fn reference_entry_scales_sibling_prices() {
        let x = fixed("X", "1", "50.00");
        let y = fixed("Y", "1", "50.00");
        let mut reference = ReferenceEntry::new("Support", d("2.5"), d("0.5"), false);
        let siblings = vec![x.clone(), y.clone()];
        reference.connect(&siblings, x.id()).expect("connect x");
        reference.connect(&siblings, y.id()).expect("connect y");
        let entry = Entry::from(reference);
        assert_eq!(entry.price(&siblings, d("50.00")), d("125.00"));
        assert!(entry.time(&siblings).is_zero());
    }

    #[test]
    fn reference_entry_in_time_mode_scales_sibling_time() {
        let base = fixed("Base", "2", "0");
        let mut reference = ReferenceEntry::new("Review", d("1"), d("0.25"), true);
        let siblings = vec![base.clone()];
        reference.connect(&siblings, base.id()).expect("connect");
        let entry = Entry::from(reference);
        assert_eq!(entry.time(&siblings), WorkDuration::from_hms(0, 30, 0));
        assert_eq!(entry.price(&siblings, d("80")), d("40.00"));
    }

    #[test]
    fn reference_entry_without_siblings_is_zero() {
        let base = fixed("Base", "2", "100");
        let mut reference = ReferenceEntry::new("Ref", d("1"), d("1"), true);
        reference.connect(&[base.clone()], base.id()).expect("connect");
        let entry = Entry::from(reference);
        assert!(entry.time(&[]).is_zero());
        assert_eq!(entry.price(&[], d("10")), Decimal::ZERO);
    }

    #[test]
    fn connect_rejects_self_unknown_and_back_reference() {
        let mut a = ReferenceEntry::new("A", d("1"), d("1"), false);
        let a_id = a.header.id();
        let mut b = ReferenceEntry::new("B", d("1"), d("1"), false);
        let siblings = vec![Entry::from(a.clone()), Entry::from(b.clone())];
        b.connect(&siblings, a_id).expect("b -> a");

        let siblings = vec![Entry::from(a.clone()), Entry::from(b.clone())];
        assert_eq!(a.connect(&siblings, a_id), Err(ConnectError::SelfReference));
        let stranger = Uuid::new_v4();
        assert_eq!(
            a.connect(&siblings, stranger),
            Err(ConnectError::UnknownEntry(stranger))
        );
        assert_eq!(
            a.connect(&siblings, b.header.id()),
            Err(ConnectError::Cycle(b.header.id()))
        );
        assert!(a.connected().is_empty());
    }

    #[test]
    fn connect_is_idempotent_and_directed() {
        let base = fixed("Base", "1", "10");
        let mut reference = ReferenceEntry::new("Ref", d("1"), d("1"), false);
        let siblings = vec![base.clone()];
        reference.connect(&siblings, base.id()).expect("first");
        reference.connect(&siblings, base.id()).expect("second");
        assert_eq!(reference.connected().len(), 1);
        assert!(reference.disconnect(base.id()));
        assert!(!reference.disconnect(base.id()));
    }

    #[test]
    fn disconnect_all_zeroes_reference() {
        let base = fixed("Base", "3", "90");
        let mut reference = ReferenceEntry::new("Ref", d("2"), d("1"), true);
        let siblings = vec![base.clone()];
        reference.connect(&siblings, base.id()).expect("connect");
        reference.disconnect_all();
        let entry = Entry::from(reference);
        assert!(entry.time(&siblings).is_zero());
        assert_eq!(entry.price(&siblings, d("100")), Decimal::ZERO);
    }

    #[test]
    fn longer_cycles_evaluate_without_recursing_forever() {
        let mut a = ReferenceEntry::new("A", d("1"), d("1"), false);
        let mut b = ReferenceEntry::new("B", d("1"), d("1"), false);
        let mut c = ReferenceEntry::new("C", d("1"), d("1"), false);
        let (a_id, b_id, c_id) = (a.header.id(), b.header.id(), c.header.id());
        let all = |a: &ReferenceEntry, b: &ReferenceEntry, c: &ReferenceEntry| {
            vec![Entry::from(a.clone()), Entry::from(b.clone()), Entry::from(c.clone())]
        };
        a.connect(&all(&a, &b, &c), b_id).expect("a -> b");
        b.connect(&all(&a, &b, &c), c_id).expect("b -> c");
        c.connect(&all(&a, &b, &c), a_id).expect("c -> a passes the one-hop check");
        let siblings = all(&a, &b, &c);
        assert_eq!(siblings[0].price(&siblings, d("10")), Decimal::ZERO);
        assert!(siblings[0].time(&siblings).is_zero());
    }

    #[test]
    fn price_tax_uses_entry_tax_percent() {
        let mut entry = fixed("Taxed", "1", "100.00");
        assert!(entry.header_mut().set_tax("19").is_applied());
        assert_eq!(entry.price_tax(&[], Decimal::ZERO), d("19.00"));

        let mut rate: Entry = RateEntry::new("Rate", d("1"), WorkDuration::from_hms(1, 0, 0)).into();
        assert!(rate.header_mut().set_tax("7").is_applied());
        assert_eq!(rate.price_tax(&[], d("33.33")), d("2.33"));
    }

    #[test]
    fn setters_fail_soft() {
        let mut entry = FixedEntry::new("Soft", WorkDuration::from_hms(1, 0, 0), d("5"));
        assert_eq!(entry.set_price("five"), Edit::Unchanged);
        assert_eq!(entry.price, d("5"));
        assert_eq!(entry.set_time("soon"), Edit::Unchanged);
        assert_eq!(entry.time, WorkDuration::from_hms(1, 0, 0));
        assert_eq!(entry.header.set_amount("1,5"), Edit::Applied);
        assert_eq!(entry.header.amount, d("1.5"));

        let mut rate = RateEntry::new("Rate", d("1"), WorkDuration::from_hms(0, 30, 0));
        assert_eq!(rate.set_hour_rate("x"), Edit::Unchanged);
        assert_eq!(rate.hour_rate, WorkDuration::from_hms(0, 30, 0));

        let mut reference = ReferenceEntry::new("Ref", d("1"), d("0.5"), false);
        assert_eq!(reference.set_multiplicator("half"), Edit::Unchanged);
        assert_eq!(reference.multiplicator, d("0.5"));
    }

    #[test]
    fn copy_mints_new_id_unless_kept() {
        let entry = fixed("Original", "1", "1");
        assert_ne!(entry.copy(false).id(), entry.id());
        assert_eq!(entry.copy(true), entry);
    }

    #[test]
    fn record_roundtrip_preserves_every_variant() {
        let base = fixed("Base", "1.25", "42.10");
        let mut reference = ReferenceEntry::new("Ref", d("3"), d("0.1"), true);
        reference.connect(&[base.clone()], base.id()).expect("connect");
        let entries = vec![
            base,
            RateEntry::new("Rate", d("4"), WorkDuration::from_hms(0, 20, 0)).into(),
            Entry::from(reference),
        ];
        for entry in entries {
            let record = entry.to_record().expect("serialize");
            let restored = Entry::from_record(record.clone(), false).expect("deserialize");
            assert_eq!(restored, entry);

            let preset = Entry::from_record(record, true).expect("preset");
            assert_ne!(preset.id(), entry.id());
            assert_eq!(preset.title(), entry.title());
        }
    }

    #[test]
    fn records_use_legacy_type_tags_and_default_missing_fields() {
        let record = serde_json::json!({ "type": "MultiplyEntry", "title": "Sparse" });
        let entry = Entry::from_record(record, false).expect("sparse record");
        match &entry {
            Entry::Rate(rate) => {
                assert!(rate.hour_rate.is_zero());
                assert_eq!(rate.header.amount, Decimal::ZERO);
            }
            other => panic!("unexpected variant {other:?}"),
        }
        let record = entry.to_record().expect("serialize");
        assert_eq!(record["type"], "MultiplyEntry");

        let unknown = serde_json::json!({ "type": "MysteryEntry" });
        assert!(Entry::from_record(unknown, false).is_err());
    }
}
