//! Spatial graph of locations and shortest-path queries.
//!
//! Exits are directed edges labelled with a direction. Paths are found with
//! breadth-first search, so every path is a minimum-hop path. Neighbours are
//! expanded in direction-label order, which makes the choice between equally
//! short paths deterministic for a given graph.
//!
//! Unknown ids never fail: they behave like a location with no exits.

use crate::clock::DEFAULT_STEP_MINUTES;
use crate::world::{opposite_direction, Location, LocationId};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

/// An exit that has no matching exit back from its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneWayExit {
    pub from: LocationId,
    pub direction: String,
    pub to: LocationId,
}

/// The world map.
#[derive(Debug, Clone)]
pub struct WorldGraph {
    locations: HashMap<LocationId, Location>,
    step_minutes: u16,
}

impl WorldGraph {
    pub fn new() -> Self {
        Self {
            locations: HashMap::new(),
            step_minutes: DEFAULT_STEP_MINUTES,
        }
    }

    /// Set the minutes one hop takes when estimating travel time.
    pub fn with_step_minutes(mut self, minutes: u16) -> Self {
        self.step_minutes = minutes;
        self
    }

    /// Replace the whole graph with `locations`.
    pub fn initialize(&mut self, locations: impl IntoIterator<Item = Location>) {
        self.locations = locations
            .into_iter()
            .map(|location| (location.id.clone(), location))
            .collect();
    }

    pub fn location(&self, id: &LocationId) -> Option<&Location> {
        self.locations.get(id)
    }

    /// Display name of a location, or the raw id if it is unknown.
    pub fn location_name<'a>(&'a self, id: &'a LocationId) -> &'a str {
        self.locations
            .get(id)
            .map(|l| l.name.as_str())
            .unwrap_or_else(|| id.as_str())
    }

    pub fn contains(&self, id: &LocationId) -> bool {
        self.locations.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn locations(&self) -> impl Iterator<Item = &Location> {
        self.locations.values()
    }

    /// Direction → target adjacency of a location. Empty for unknown ids.
    pub fn exits(&self, id: &LocationId) -> BTreeMap<String, LocationId> {
        self.locations
            .get(id)
            .map(|l| l.exits.clone())
            .unwrap_or_default()
    }

    /// True if `b` is a direct exit target of `a`.
    pub fn are_connected(&self, a: &LocationId, b: &LocationId) -> bool {
        self.direction(a, b).is_some()
    }

    /// The label of the exit leading from `a` directly to `b`.
    pub fn direction(&self, a: &LocationId, b: &LocationId) -> Option<&str> {
        self.locations
            .get(a)?
            .exits
            .iter()
            .find(|(_, target)| *target == b)
            .map(|(direction, _)| direction.as_str())
    }

    /// Shortest path from `start` to `target`.
    ///
    /// The result excludes `start` and ends with `target`. It is empty when
    /// the two are equal or when `target` cannot be reached.
    pub fn find_path(&self, start: &LocationId, target: &LocationId) -> Vec<LocationId> {
        if start == target || !self.locations.contains_key(start) {
            return Vec::new();
        }

        let mut came_from: HashMap<&LocationId, &LocationId> = HashMap::new();
        let mut visited: HashSet<&LocationId> = HashSet::new();
        let mut queue: VecDeque<&LocationId> = VecDeque::new();

        visited.insert(start);
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            let Some(location) = self.locations.get(current) else {
                continue;
            };

            for next in location.exits.values() {
                if !visited.insert(next) {
                    continue;
                }
                came_from.insert(next, current);

                if next == target {
                    return Self::rebuild_path(&came_from, start, target);
                }
                queue.push_back(next);
            }
        }

        Vec::new()
    }

    fn rebuild_path(
        came_from: &HashMap<&LocationId, &LocationId>,
        start: &LocationId,
        target: &LocationId,
    ) -> Vec<LocationId> {
        let mut path = vec![target.clone()];
        let mut current = target;
        while let Some(&previous) = came_from.get(current) {
            if previous == start {
                break;
            }
            path.push(previous.clone());
            current = previous;
        }
        path.reverse();
        path
    }

    /// The first hop toward `target`, if there is a path.
    pub fn next_step(&self, start: &LocationId, target: &LocationId) -> Option<LocationId> {
        self.find_path(start, target).into_iter().next()
    }

    /// Minutes needed to walk from `start` to `target`. Zero when unreachable.
    pub fn travel_time(&self, start: &LocationId, target: &LocationId) -> u32 {
        self.find_path(start, target).len() as u32 * self.step_minutes as u32
    }

    /// Exits whose target has no exit back in the opposite direction.
    ///
    /// Only exits with a known opposite label are checked; free-form labels
    /// are accepted if any exit leads back.
    pub fn one_way_exits(&self) -> Vec<OneWayExit> {
        let mut found = Vec::new();
        for location in self.locations.values() {
            for (direction, target) in &location.exits {
                let back = match opposite_direction(direction) {
                    Some(opposite) => self
                        .locations
                        .get(target)
                        .and_then(|t| t.exits.get(opposite))
                        .is_some_and(|id| *id == location.id),
                    None => self.are_connected(target, &location.id),
                };
                if !back {
                    found.push(OneWayExit {
                        from: location.id.clone(),
                        direction: direction.clone(),
                        to: target.clone(),
                    });
                }
            }
        }
        found.sort_by(|a, b| (&a.from, &a.direction).cmp(&(&b.from, &b.direction)));
        found
    }
}

impl Default for WorldGraph {
    fn default() -> Self {
        Self::new()
    }
}
