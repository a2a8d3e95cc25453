//! Per-actor timetables.
//!
//! Each actor owns a list of [`ScheduleEntry`] values kept sorted by time.
//! On every tick the store works out where each actor ought to be and emits
//! a [`MovementIntent`] for those who are somewhere else.

use crate::clock::{ClockTime, DEFAULT_STEP_MINUTES};
use crate::world::{Actor, ActorId, LocationId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One line of an actor's timetable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub time: ClockTime,
    pub action: String,
    pub target_location: LocationId,
}

impl ScheduleEntry {
    pub fn new(time: ClockTime, action: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            time,
            action: action.into(),
            target_location: LocationId::new(target),
        }
    }
}

/// A request to move an actor from where it is toward its scheduled place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementIntent {
    pub actor_id: ActorId,
    pub from: LocationId,
    pub to: LocationId,
}

/// Timetables for every scheduled actor.
#[derive(Debug, Clone)]
pub struct ScheduleStore {
    schedules: HashMap<ActorId, Vec<ScheduleEntry>>,
    bucket_minutes: u16,
}

impl ScheduleStore {
    pub fn new() -> Self {
        Self {
            schedules: HashMap::new(),
            bucket_minutes: DEFAULT_STEP_MINUTES,
        }
    }

    /// Use a different time bucket when normalizing entry times.
    pub fn with_bucket_minutes(mut self, minutes: u16) -> Self {
        self.bucket_minutes = minutes;
        self
    }

    /// Replace an actor's timetable. Times are snapped to the nearest bucket
    /// and the entries sorted.
    ///
    /// Snapping happens first, so with 5-minute buckets an entry authored at
    /// `00:01` or `00:02` becomes `00:00` and sorts last, as midnight at the
    /// end of the day.
    pub fn set_schedule(&mut self, actor_id: ActorId, entries: Vec<ScheduleEntry>) {
        let mut entries = entries;
        for entry in &mut entries {
            entry.time = entry.time.rounded_to_bucket(self.bucket_minutes);
        }
        sort_entries(&mut entries);
        self.schedules.insert(actor_id, entries);
    }

    /// Replace every timetable at once.
    pub fn set_all(&mut self, schedules: HashMap<ActorId, Vec<ScheduleEntry>>) {
        self.schedules.clear();
        for (actor_id, entries) in schedules {
            self.set_schedule(actor_id, entries);
        }
    }

    pub fn clear(&mut self) {
        self.schedules.clear();
    }

    pub fn schedule(&self, actor_id: &ActorId) -> Option<&[ScheduleEntry]> {
        self.schedules.get(actor_id).map(Vec::as_slice)
    }

    pub fn has_schedule(&self, actor_id: &ActorId) -> bool {
        self.schedules.contains_key(actor_id)
    }

    /// Insert a spontaneous entry into an existing timetable.
    ///
    /// Returns `false` if the actor has no timetable to add to.
    pub fn add_event(
        &mut self,
        actor_id: &ActorId,
        time: ClockTime,
        action: impl Into<String>,
        location: LocationId,
    ) -> bool {
        let bucket = self.bucket_minutes;
        let Some(entries) = self.schedules.get_mut(actor_id) else {
            return false;
        };
        entries.push(ScheduleEntry {
            time: time.rounded_to_bucket(bucket),
            action: action.into(),
            target_location: location,
        });
        sort_entries(entries);
        true
    }

    /// The entry that has most recently started at `now`.
    ///
    /// `None` if the actor has no timetable or its day has not begun yet.
    pub fn target_event(&self, actor_id: &ActorId, now: ClockTime) -> Option<&ScheduleEntry> {
        let now = now.as_schedule_minutes();
        self.schedules
            .get(actor_id)?
            .iter()
            .take_while(|entry| entry.time.as_schedule_minutes() <= now)
            .last()
    }

    /// Movement intents for every actor that is not where its timetable says.
    pub fn tick(&self, now: ClockTime, actors: &BTreeMap<ActorId, Actor>) -> Vec<MovementIntent> {
        actors
            .values()
            .filter_map(|actor| {
                let target = self.target_event(&actor.id, now)?;
                (target.target_location != actor.current_location).then(|| MovementIntent {
                    actor_id: actor.id.clone(),
                    from: actor.current_location.clone(),
                    to: target.target_location.clone(),
                })
            })
            .collect()
    }

    /// What the actor is busy with at `now`, for narration.
    ///
    /// Falls back to the first entry of the day before the timetable starts.
    pub fn scheduled_action(&self, actor_id: &ActorId, now: ClockTime) -> Option<&str> {
        self.target_event(actor_id, now)
            .or_else(|| self.schedules.get(actor_id)?.first())
            .map(|entry| entry.action.as_str())
    }
}

impl Default for ScheduleStore {
    fn default() -> Self {
        Self::new()
    }
}

fn sort_entries(entries: &mut [ScheduleEntry]) {
    entries.sort_by_key(|entry| entry.time.as_schedule_minutes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> ClockTime {
        s.parse().unwrap()
    }

    fn roster(actors: Vec<Actor>) -> BTreeMap<ActorId, Actor> {
        actors.into_iter().map(|a| (a.id.clone(), a)).collect()
    }

    fn store() -> ScheduleStore {
        let mut store = ScheduleStore::new();
        store.set_schedule(
            ActorId::from("mara"),
            vec![
                ScheduleEntry::new(t("18:10"), "light the lamps", "mill"),
                ScheduleEntry::new(t("08:00"), "open the bakery", "bakery"),
                ScheduleEntry::new(t("12:00"), "eat lunch", "square"),
            ],
        );
        store
    }

    #[test]
    fn test_entries_are_sorted() {
        let store = store();
        let times: Vec<_> = store
            .schedule(&ActorId::from("mara"))
            .unwrap()
            .iter()
            .map(|e| e.time.to_string())
            .collect();
        assert_eq!(times, vec!["08:00", "12:00", "18:10"]);
    }

    #[test]
    fn test_entry_just_after_midnight_snaps_to_end_of_day() {
        let mut store = ScheduleStore::new();
        let ilse = ActorId::from("ilse");
        store.set_schedule(
            ilse.clone(),
            vec![
                ScheduleEntry::new(t("00:01"), "bank the fire", "mill"),
                ScheduleEntry::new(t("08:00"), "open the sluice", "mill"),
            ],
        );

        let times: Vec<_> = store
            .schedule(&ilse)
            .unwrap()
            .iter()
            .map(|e| e.time.to_string())
            .collect();
        assert_eq!(times, vec!["08:00", "00:00"]);
        assert_eq!(
            store.target_event(&ilse, t("09:00")).unwrap().action,
            "open the sluice"
        );
        assert_eq!(
            store.target_event(&ilse, t("23:55")).unwrap().action,
            "open the sluice"
        );
        assert_eq!(
            store.target_event(&ilse, t("00:00")).unwrap().action,
            "bank the fire"
        );
    }

    #[test]
    fn test_target_event_is_latest_started() {
        let store = store();
        let mara = ActorId::from("mara");
        assert!(store.target_event(&mara, t("07:55")).is_none());
        assert_eq!(store.target_event(&mara, t("08:00")).unwrap().action, "open the bakery");
        assert_eq!(store.target_event(&mara, t("17:00")).unwrap().action, "eat lunch");
        assert_eq!(store.target_event(&mara, t("23:00")).unwrap().action, "light the lamps");
    }

    #[test]
    fn test_tick_emits_intent_only_when_away() {
        let store = store();
        let actors = roster(vec![
            Actor::new("mara", "Mara", "bakery"),
            Actor::new("tomas", "Tomas", "square"),
        ]);

        assert!(store.tick(t("09:00"), &actors).is_empty());

        let intents = store.tick(t("12:00"), &actors);
        assert_eq!(
            intents,
            vec![MovementIntent {
                actor_id: ActorId::from("mara"),
                from: LocationId::from("bakery"),
                to: LocationId::from("square"),
            }]
        );
    }

    #[test]
    fn test_no_intent_before_day_starts() {
        let store = store();
        let actors = roster(vec![Actor::new("mara", "Mara", "square")]);
        assert!(store.tick(t("06:00"), &actors).is_empty());
    }

    #[test]
    fn test_midnight_entry_sorts_last() {
        let mut store = ScheduleStore::new();
        let owl = ActorId::from("owl");
        store.set_schedule(
            owl.clone(),
            vec![
                ScheduleEntry::new(t("00:00"), "go to roost", "barn"),
                ScheduleEntry::new(t("22:00"), "hunt", "field"),
            ],
        );
        let entries = store.schedule(&owl).unwrap();
        assert_eq!(entries[0].action, "hunt");
        assert_eq!(entries[1].action, "go to roost");
        assert_eq!(store.target_event(&owl, t("23:55")).unwrap().action, "hunt");
        assert_eq!(store.target_event(&owl, t("00:00")).unwrap().action, "go to roost");
    }

    #[test]
    fn test_times_are_bucketed() {
        let mut store = ScheduleStore::new();
        let id = ActorId::from("x");
        store.set_schedule(id.clone(), vec![ScheduleEntry::new(t("09:58"), "work", "mill")]);
        assert_eq!(store.schedule(&id).unwrap()[0].time, t("10:00"));
        assert!(store.target_event(&id, t("09:59")).is_none());
    }

    #[test]
    fn test_add_event() {
        let mut store = store();
        let mara = ActorId::from("mara");
        assert!(store.add_event(&mara, t("14:00"), "visit the well", LocationId::from("well")));
        assert_eq!(store.target_event(&mara, t("14:00")).unwrap().action, "visit the well");
        assert_eq!(store.schedule(&mara).unwrap().len(), 4);

        assert!(!store.add_event(
            &ActorId::from("ghost"),
            t("14:00"),
            "haunt",
            LocationId::from("well"),
        ));
    }

    #[test]
    fn test_scheduled_action_defaults_to_first() {
        let store = store();
        let mara = ActorId::from("mara");
        assert_eq!(store.scheduled_action(&mara, t("05:00")), Some("open the bakery"));
        assert_eq!(store.scheduled_action(&mara, t("12:30")), Some("eat lunch"));
        assert_eq!(store.scheduled_action(&ActorId::from("ghost"), t("12:30")), None);
    }
}
