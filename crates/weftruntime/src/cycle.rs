use crate::repository::{Entity, InMemoryRepository, Repository};
use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, Utc};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;
use weftcore::Frequency;

pub type CycleId = String;

/// One recurrence window of a given frequency: the half-open interval
/// `[start, end)` containing the creation date.
#[derive(Clone)]
pub struct Cycle {
    inner: Arc<CycleInner>,
}

struct CycleInner {
    id: CycleId,
    frequency: Frequency,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    name: String,
}

impl Cycle {
    fn new(frequency: Frequency, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        let name = format!("{}_{}", frequency, start.format("%Y-%m-%d"));
        Self {
            inner: Arc::new(CycleInner {
                id: format!("cycle_{}_{}", name, Uuid::new_v4()),
                frequency,
                start,
                end,
                name,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn frequency(&self) -> Frequency {
        self.inner.frequency
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.inner.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.inner.end
    }

    pub fn contains(&self, date: DateTime<Utc>) -> bool {
        self.inner.start <= date && date < self.inner.end
    }
}

impl PartialEq for Cycle {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Cycle {}

impl fmt::Debug for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cycle")
            .field("id", &self.inner.id)
            .field("frequency", &self.inner.frequency)
            .field("start", &self.inner.start)
            .field("end", &self.inner.end)
            .finish()
    }
}

impl Entity for Cycle {
    fn id(&self) -> String {
        self.inner.id.clone()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        match name {
            "frequency" => Some(self.inner.frequency.to_string()),
            "start" => Some(self.inner.start.to_rfc3339()),
            _ => None,
        }
    }
}

/// Resolves `(frequency, date)` pairs to cycles, reusing the existing cycle
/// whose window contains the date.
#[derive(Clone)]
pub struct CycleManager {
    repository: Arc<dyn Repository<Cycle>>,
    creation_guard: Arc<Mutex<()>>,
}

impl Default for CycleManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleManager {
    pub fn new() -> Self {
        Self {
            repository: InMemoryRepository::new(),
            creation_guard: Arc::new(Mutex::new(())),
        }
    }

    /// Returns the cycle of the given frequency whose window contains
    /// `date`, creating it if needed.
    pub fn get_or_create(&self, frequency: Frequency, date: DateTime<Utc>) -> Cycle {
        let _guard = self.creation_guard.lock();
        let existing = self
            .repository
            .search_all("frequency", &frequency.to_string())
            .into_iter()
            .find(|cycle| cycle.contains(date));
        if let Some(cycle) = existing {
            return cycle;
        }
        let start = window_start(frequency, date);
        let end = window_end(frequency, start);
        let cycle = Cycle::new(frequency, start, end);
        tracing::info!(cycle_id = cycle.id(), frequency = %frequency, "cycle created");
        self.repository.save(cycle.clone());
        cycle
    }

    pub fn get(&self, id: &str) -> Option<Cycle> {
        self.repository.load(id)
    }

    pub fn get_all(&self) -> Vec<Cycle> {
        self.repository.load_all()
    }

    pub fn delete_all(&self) {
        self.repository.delete_all();
    }
}

fn window_start(frequency: Frequency, date: DateTime<Utc>) -> DateTime<Utc> {
    let day = date.date_naive();
    let start_day = match frequency {
        Frequency::Daily => day,
        // Weeks start on Monday.
        Frequency::Weekly => day - Days::new(day.weekday().num_days_from_monday() as u64),
        Frequency::Monthly => day.with_day(1).unwrap_or(day),
        Frequency::Yearly => NaiveDate::from_ymd_opt(day.year(), 1, 1).unwrap_or(day),
    };
    start_day.and_time(NaiveTime::MIN).and_utc()
}

fn window_end(frequency: Frequency, start: DateTime<Utc>) -> DateTime<Utc> {
    match frequency {
        Frequency::Daily => start + Days::new(1),
        Frequency::Weekly => start + Days::new(7),
        Frequency::Monthly => start + Months::new(1),
        Frequency::Yearly => start + Months::new(12),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 30, 0).unwrap()
    }

    #[test]
    fn daily_window_covers_the_whole_day() {
        let manager = CycleManager::new();
        let cycle = manager.get_or_create(Frequency::Daily, at(2024, 3, 15, 14));
        assert_eq!(
            cycle.start(),
            Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap()
        );
        assert!(cycle.contains(at(2024, 3, 15, 0)));
        assert!(cycle.contains(at(2024, 3, 15, 23)));
        assert!(!cycle.contains(at(2024, 3, 16, 0)));
    }

    #[test]
    fn same_window_resolves_to_the_same_cycle() {
        let manager = CycleManager::new();
        let morning = manager.get_or_create(Frequency::Daily, at(2024, 3, 15, 8));
        let evening = manager.get_or_create(Frequency::Daily, at(2024, 3, 15, 22));
        assert_eq!(morning, evening);
        let next_day = manager.get_or_create(Frequency::Daily, at(2024, 3, 16, 8));
        assert_ne!(morning, next_day);
    }

    #[test]
    fn weekly_window_starts_on_monday() {
        let manager = CycleManager::new();
        // 2024-03-15 is a Friday; the week starts 2024-03-11.
        let cycle = manager.get_or_create(Frequency::Weekly, at(2024, 3, 15, 10));
        assert_eq!(cycle.start().date_naive(), NaiveDate::from_ymd_opt(2024, 3, 11).unwrap());
        assert!(cycle.contains(at(2024, 3, 11, 0)));
        assert!(!cycle.contains(at(2024, 3, 18, 0)));
    }

    #[test]
    fn monthly_and_yearly_windows() {
        let manager = CycleManager::new();
        let month = manager.get_or_create(Frequency::Monthly, at(2024, 2, 20, 10));
        assert_eq!(month.start().date_naive(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(month.end().date_naive(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        let year = manager.get_or_create(Frequency::Yearly, at(2024, 7, 4, 10));
        assert_eq!(year.start().date_naive(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(year.end().date_naive(), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
    }
}
