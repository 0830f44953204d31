//! Valid-time enumeration and search over a generation directory.
//!
//! Listings parse every metafile name in the generation (new format and
//! old format alike), keep the ones carrying a valid time that agree with
//! the descriptor's element, level and valid time, filter them by the time
//! dependence of their element, and return the distinct valid times in
//! canonical order.

use crate::descriptor::FieldDescriptor;
use crate::environ::Environ;
use crate::error::{FieldStoreError, Result};
use crate::ident::{self, FileIdent};
use crate::registry::{FieldId, TimeDepMask, TimeDependence};
use crate::tstamp::Timestamp;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, error, warn};

/// A bounded window over a valid-time list.
///
/// Bounds are snapped to the closest listed valid time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidWindow {
    /// Every time from the first bound through the second.
    Between(Timestamp, Timestamp),
    /// Up to `count` times starting at the bound.
    From(Timestamp, usize),
    /// Up to `count` times ending at the bound.
    Until(Timestamp, usize),
    /// `count` times centred on the bound, shifted to stay inside the list.
    Around(Timestamp, usize),
}

/// Result of a valid-time search.
///
/// Only built by the searches, so `index` always lies inside `times`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidTimeMatch {
    index: usize,
    times: Vec<Timestamp>,
}

impl ValidTimeMatch {
    fn new(times: Vec<Timestamp>, index: usize) -> Option<Self> {
        (index < times.len()).then_some(Self { index, times })
    }

    /// Position of the selected time in [`ValidTimeMatch::times`].
    pub fn index(&self) -> usize {
        self.index
    }

    /// The list that was searched.
    pub fn times(&self) -> &[Timestamp] {
        &self.times
    }

    /// Consumes the match, returning the searched list.
    pub fn into_times(self) -> Vec<Timestamp> {
        self.times
    }

    /// The selected valid time.
    pub fn valid_time(&self) -> Timestamp {
        self.times[self.index]
    }
}

/// Index of the latest time not after `query`, among times sharing the
/// query's locality.
///
/// When every such time is after the query the first of them is returned.
/// `None` if no time shares the query's locality.
pub fn matched_index(times: &[Timestamp], query: &Timestamp) -> Option<usize> {
    let mut first = None;
    for (index, time) in times.iter().enumerate().rev() {
        if time.is_local() != query.is_local() {
            continue;
        }
        if time.minutes_until(query) >= 0 {
            return Some(index);
        }
        first = Some(index);
    }
    first
}

/// Index of the time nearest `query`, among times sharing the query's
/// locality. Ties go to the earlier entry.
pub fn closest_index(times: &[Timestamp], query: &Timestamp) -> Option<usize> {
    let mut best: Option<(usize, i64)> = None;
    for (index, time) in times.iter().enumerate() {
        if time.is_local() != query.is_local() {
            continue;
        }
        let distance = time.minutes_until(query).abs();
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((index, distance));
        }
    }
    best.map(|(index, _)| index)
}

/// Enumerates and searches valid times of source generations.
///
/// # Examples
/// ```rust,ignore
/// use alopex_fieldstore::registry::TimeDepMask;
///
/// let index = env.index();
/// let times = index.valid_time_list(&desc, TimeDepMask::ANY)?;
/// let nearest = index.closest_valid_time(&desc, TimeDepMask::ANY, &query)?;
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TemporalIndex<'a> {
    env: &'a Environ,
}

impl<'a> TemporalIndex<'a> {
    /// Creates an index bound to a context.
    pub fn new(env: &'a Environ) -> Self {
        Self { env }
    }

    /// Distinct valid times in the descriptor's generation, in canonical
    /// order.
    ///
    /// Only Depiction, Guidance and Allied sources hold valid times; other
    /// source types and missing generations give an empty list.
    pub fn valid_time_list(
        &self,
        desc: &FieldDescriptor,
        mask: TimeDepMask,
    ) -> Result<Vec<Timestamp>> {
        let times: BTreeSet<Timestamp> = self
            .scan(desc, mask)?
            .into_iter()
            .filter_map(|ident| ident.valid_time)
            .collect();
        Ok(times.into_iter().collect())
    }

    /// Distinct fields in the descriptor's generation, sorted by element
    /// name and then level name.
    pub fn field_list(&self, desc: &FieldDescriptor, mask: TimeDepMask) -> Result<Vec<FieldId>> {
        let registry = self.env.registry();
        let mut fields: Vec<FieldId> = Vec::new();
        for ident in self.scan(desc, mask)? {
            if let Some(field) = registry.identify_field(ident.element, ident.level) {
                if !fields.contains(&field) {
                    fields.push(field);
                }
            }
        }
        fields.sort_by(|a, b| {
            let (a, b) = (registry.field(*a), registry.field(*b));
            registry
                .element(a.element)
                .name
                .cmp(&registry.element(b.element).name)
                .then_with(|| {
                    registry
                        .level(a.level)
                        .name
                        .cmp(&registry.level(b.level).name)
                })
        });
        Ok(fields)
    }

    /// A window of the valid times listed for the descriptor, ignoring its
    /// own valid time.
    pub fn valid_time_sublist(
        &self,
        desc: &FieldDescriptor,
        mask: TimeDepMask,
        window: ValidWindow,
    ) -> Result<Vec<Timestamp>> {
        let desc = desc.with_valid_time(None);
        let times = self.valid_time_list(&desc, mask)?;
        if times.is_empty() {
            return Ok(Vec::new());
        }
        let last = times.len() - 1;
        let closest = |query: &Timestamp| -> Result<Option<usize>> {
            Ok(self.closest_valid_time(&desc, mask, query)?.map(|m| m.index()))
        };

        let range = match window {
            ValidWindow::Between(begin, end) => match (closest(&begin)?, closest(&end)?) {
                (Some(begin), Some(end)) if begin <= end => Some((begin, end)),
                _ => None,
            },
            ValidWindow::From(begin, count) if count > 0 => {
                closest(&begin)?.map(|begin| (begin, (begin + count - 1).min(last)))
            }
            ValidWindow::Until(end, count) if count > 0 => {
                closest(&end)?.map(|end| ((end + 1).saturating_sub(count), end))
            }
            ValidWindow::Around(centre, count) if count > 0 => {
                closest(&centre)?.map(|centre| centred(centre, count, times.len()))
            }
            _ => None,
        };

        Ok(match range {
            Some((begin, end)) => times[begin..=end].to_vec(),
            None => Vec::new(),
        })
    }

    /// Latest listed valid time not after `query`.
    ///
    /// Daily fields compare in local time and other fields in GMT, at the
    /// descriptor's reference longitude. The listing ignores the
    /// descriptor's valid time; if nothing is listed for its field, every
    /// field in the generation is considered.
    pub fn matched_valid_time(
        &self,
        desc: &FieldDescriptor,
        mask: TimeDepMask,
        query: &Timestamp,
    ) -> Result<Option<ValidTimeMatch>> {
        self.search(desc, mask, query, matched_index)
    }

    /// Listed valid time nearest `query`, with the same conventions as
    /// [`TemporalIndex::matched_valid_time`].
    pub fn closest_valid_time(
        &self,
        desc: &FieldDescriptor,
        mask: TimeDepMask,
        query: &Timestamp,
    ) -> Result<Option<ValidTimeMatch>> {
        self.search(desc, mask, query, closest_index)
    }

    /// Leaves the descriptor alone if its metafile exists, otherwise resets
    /// its valid time to the matched valid time. Returns false if neither
    /// succeeds.
    pub fn matched_valid_time_reset(
        &self,
        desc: &mut FieldDescriptor,
        mask: TimeDepMask,
        query: &Timestamp,
    ) -> Result<bool> {
        self.reset(desc, mask, query, matched_index)
    }

    /// Leaves the descriptor alone if its metafile exists, otherwise resets
    /// its valid time to the closest valid time. Returns false if neither
    /// succeeds.
    pub fn closest_valid_time_reset(
        &self,
        desc: &mut FieldDescriptor,
        mask: TimeDepMask,
        query: &Timestamp,
    ) -> Result<bool> {
        self.reset(desc, mask, query, closest_index)
    }

    /// Local valid times at which to compute a daily field from the fields
    /// of another descriptor, centred at longitude `clon`.
    ///
    /// Existing daily valid times of the input are taken as they are. Static
    /// and normal valid times contribute one time per local day they span,
    /// at the daily element's normal hour.
    pub fn daily_field_local_times(
        &self,
        daily: &FieldDescriptor,
        input: &FieldDescriptor,
        mask: TimeDepMask,
        clon: f32,
    ) -> Result<Vec<Timestamp>> {
        let registry = self.env.registry();
        let element = daily
            .element()
            .ok_or(FieldStoreError::IncompleteDescriptor("element"))?;
        let element = registry.element(element);
        if element.time_dependence != TimeDependence::Daily {
            error!("\"{}\" is not a daily field", element.name);
            return Err(FieldStoreError::NotDaily(element.name.clone()));
        }
        let normal_hour = element.daily.normal.round() as i64;

        let input = input.with_valid_time(None);
        let mut local_times: Vec<Timestamp> = Vec::new();

        if mask == TimeDepMask::ANY || mask.contains(TimeDepMask::DAILY) {
            let times = self.valid_time_list(&input, TimeDepMask::DAILY)?;
            if times.is_empty() {
                debug!("No daily fields for {:?}", input);
            }
            for time in times {
                if !local_times.contains(&time) {
                    local_times.push(time);
                }
            }
        }

        let timed = mask & (TimeDepMask::STATIC | TimeDepMask::NORMAL);
        if mask == TimeDepMask::ANY || !timed.is_empty() {
            let timed = if mask == TimeDepMask::ANY {
                TimeDepMask::STATIC | TimeDepMask::NORMAL
            } else {
                timed
            };
            let times = self.valid_time_list(&input, timed)?;
            match (times.first(), times.last()) {
                (Some(first), Some(last)) => {
                    let begin = first.to_local(clon);
                    let end = last.to_local(clon);
                    for day in 0.. {
                        let Some(local) = Timestamp::normalized(
                            begin.year(),
                            i64::from(begin.jday()) + day,
                            normal_hour,
                            0,
                            0,
                            true,
                            false,
                        ) else {
                            break;
                        };
                        if end.minutes_until(&local) > 0 {
                            break;
                        }
                        if begin.minutes_until(&local) >= 0 && !local_times.contains(&local) {
                            local_times.push(local);
                        }
                    }
                }
                _ => debug!("No normal fields for {:?}", input),
            }
        }
        Ok(local_times)
    }

    /// Input valid times (GMT) that fall in the daily window of a daily
    /// descriptor's local valid time, at longitude `clon`.
    ///
    /// Without an element the window spans the whole local day.
    pub fn valid_range_for_daily(
        &self,
        daily: &FieldDescriptor,
        input: &FieldDescriptor,
        mask: TimeDepMask,
        clon: f32,
    ) -> Result<Vec<Timestamp>> {
        let registry = self.env.registry();
        let vtime = match daily.valid_time() {
            Some(vtime) if vtime.is_local() => *vtime,
            other => {
                error!("Daily field valid time must be local: {:?}", other);
                return Err(FieldStoreError::InvalidTimestamp(
                    other.map(Timestamp::to_string).unwrap_or_default(),
                ));
            }
        };

        let (mut begin_hour, mut end_hour) = match daily.element() {
            None => (0, 24),
            Some(element) => {
                let element = registry.element(element);
                if element.time_dependence != TimeDependence::Daily {
                    error!("\"{}\" is not a daily field", element.name);
                    return Err(FieldStoreError::NotDaily(element.name.clone()));
                }
                (
                    element.daily.begin.round() as i64,
                    element.daily.end.round() as i64,
                )
            }
        };

        let hour = i64::from(vtime.hour());
        if hour < begin_hour || hour > end_hour {
            if hour >= begin_hour - 24 && hour <= end_hour - 24 {
                begin_hour -= 24;
                end_hour -= 24;
            } else if hour >= begin_hour + 24 && hour <= end_hour + 24 {
                begin_hour += 24;
                end_hour += 24;
            } else {
                return Ok(Vec::new());
            }
        }

        let bound = |hour: i64| {
            Timestamp::normalized(vtime.year(), i64::from(vtime.jday()), hour, 0, 0, true, false)
                .map(|local| local.to_gmt(clon))
                .ok_or_else(|| FieldStoreError::InvalidTimestamp(vtime.to_string()))
        };
        let begin = bound(begin_hour)?;
        let end = bound(end_hour)?;

        let times = self.valid_time_sublist(input, mask, ValidWindow::Between(begin, end))?;
        if let [only] = times.as_slice() {
            let before = begin.minutes_until(only);
            let after = end.minutes_until(only);
            if (before < 0 && after < 0) || (before > 0 && after > 0) {
                return Ok(Vec::new());
            }
        }
        Ok(times)
    }

    /// True if every valid time in the named source agrees with the
    /// source's minutes convention.
    pub fn check_minutes_in_filenames(&self, name: &str) -> Result<bool> {
        let registry = self.env.registry();
        let resolver = self.env.resolver();
        let desc = resolver.descriptor_by_name(name, "", None)?;
        let Some(source) = desc.source().map(|id| registry.source(id)) else {
            return Ok(true);
        };

        for vtime in self.valid_time_list(&desc, TimeDepMask::ANY)? {
            if vtime.has_minutes() == source.minutes_required {
                continue;
            }
            let dir = resolver.source_directory(&desc)?.unwrap_or_default();
            if source.minutes_required {
                warn!("Timestamps missing minutes in directory: {}", dir.display());
            } else {
                warn!("Timestamps have minutes in directory: {}", dir.display());
            }
            return Ok(false);
        }
        Ok(true)
    }

    fn search(
        &self,
        desc: &FieldDescriptor,
        mask: TimeDepMask,
        query: &Timestamp,
        pick: fn(&[Timestamp], &Timestamp) -> Option<usize>,
    ) -> Result<Option<ValidTimeMatch>> {
        let registry = self.env.registry();
        let clon = desc.center_lon();
        let query = match desc.time_dependence(registry) {
            Some(TimeDependence::Daily) => query.to_local(clon),
            Some(_) => query.to_gmt(clon),
            None => *query,
        };

        let desc = desc.with_valid_time(None);
        let mut times = self.valid_time_list(&desc, mask)?;
        if times.is_empty() {
            times = self.valid_time_list(&desc.without_field(), mask)?;
        }
        Ok(pick(&times, &query).and_then(|index| ValidTimeMatch::new(times, index)))
    }

    fn reset(
        &self,
        desc: &mut FieldDescriptor,
        mask: TimeDepMask,
        query: &Timestamp,
        pick: fn(&[Timestamp], &Timestamp) -> Option<usize>,
    ) -> Result<bool> {
        if self.env.metafiles().find_meta_filename(desc)?.is_some() {
            return Ok(true);
        }
        match self.search(desc, mask, query, pick)? {
            Some(found) => {
                *desc = desc.with_valid_time(Some(found.valid_time()));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn scan(&self, desc: &FieldDescriptor, mask: TimeDepMask) -> Result<Vec<FileIdent>> {
        let registry = self.env.registry();
        if !desc
            .source_type(registry)
            .is_some_and(|source_type| source_type.has_valid_times())
        {
            return Ok(Vec::new());
        }
        let Some(dir) = self.env.resolver().source_directory(desc)? else {
            return Ok(Vec::new());
        };

        let mut idents = Vec::new();
        for name in list_files(&dir)? {
            let ident = match ident::decode(registry, &name) {
                Ok(ident) => ident,
                Err(err) => {
                    debug!("Skipping {} in {}: {}", name, dir.display(), err);
                    continue;
                }
            };
            let Some(vtime) = ident.valid_time else {
                continue;
            };
            if desc.element().is_some_and(|e| e != ident.element)
                || desc.level().is_some_and(|l| l != ident.level)
                || desc.valid_time().is_some_and(|v| !v.matches(&vtime))
            {
                continue;
            }
            let dependence = registry.element(ident.element).time_dependence;
            if mask != TimeDepMask::ANY && !mask.intersects(dependence.mask()) {
                continue;
            }
            idents.push(ident);
        }
        Ok(idents)
    }
}

fn centred(centre: usize, count: usize, len: usize) -> (usize, usize) {
    if count >= len {
        return (0, len - 1);
    }
    let begin = centre.saturating_sub(count / 2);
    let end = begin + count - 1;
    if end > len - 1 {
        (len - count, len - 1)
    } else {
        (begin, end)
    }
}

/// Names of the regular files in `dir`; empty if it does not exist.
pub(crate) fn list_files(dir: &Path) -> Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::FieldUpdate;
    use crate::lock::LockConfig;
    use crate::registry::{
        DailyWindow, ElementDef, LevelDef, Registry, SourceDef, SourceType,
    };
    use std::time::Duration;
    use tempfile::TempDir;

    fn ts(text: &str) -> Timestamp {
        Timestamp::parse(text).unwrap()
    }

    fn stamps(texts: &[&str]) -> Vec<Timestamp> {
        texts.iter().map(|t| ts(t)).collect()
    }

    fn environ(root: &Path) -> Environ {
        let mut registry = Registry::new();
        registry.add_directory("Data", root);
        registry
            .add_source(SourceDef::new("GEM", SourceType::Guidance, "Data", "GEM").with_layers(2))
            .unwrap();
        registry
            .add_source(SourceDef::new("maps", SourceType::Maps, "Data", "maps"))
            .unwrap();
        let pressure = registry
            .add_element(ElementDef::new("pressure", "pressure", "pr"))
            .unwrap();
        let temperature = registry
            .add_element(ElementDef::new("temperature", "temperature", "tt"))
            .unwrap();
        let max_temp = registry
            .add_element(
                ElementDef::new("max_temp", "max_temp", "mx")
                    .with_daily_window(DailyWindow::new(0.0, 24.0, 15.0)),
            )
            .unwrap();
        let terrain = registry
            .add_element(
                ElementDef::new("terrain", "terrain", "te")
                    .with_time_dependence(TimeDependence::Static),
            )
            .unwrap();
        let msl = registry.add_level(LevelDef::new("msl", "msl", "msl")).unwrap();
        let surface = registry.add_level(LevelDef::new("surface", "surface", "sfc")).unwrap();
        registry.add_field(pressure, msl).unwrap();
        registry.add_field(temperature, surface).unwrap();
        registry.add_field(max_temp, surface).unwrap();
        registry.add_field(terrain, surface).unwrap();
        Environ::new(registry).with_lock_config(
            LockConfig::default()
                .with_retry_interval(Duration::from_millis(1))
                .with_drain_attempts(2),
        )
    }

    fn populate(env: &Environ, names: &[&str]) -> FieldDescriptor {
        let resolver = env.resolver();
        let dir = resolver
            .prepare_source_directory_by_name("GEM", "", Some("1991:238:00"))
            .unwrap();
        for name in names {
            fs::write(dir.join(name), b"").unwrap();
        }
        resolver
            .descriptor_by_name("GEM", "", Some("1991:238:00"))
            .unwrap()
    }

    #[test]
    fn test_matched_index() {
        let times = stamps(&["1991:238:00", "1991:238:06", "1991:238:12"]);
        assert_eq!(matched_index(&times, &ts("1991:238:07")), Some(1));
        assert_eq!(matched_index(&times, &ts("1991:238:12")), Some(2));
        assert_eq!(matched_index(&times, &ts("1991:239:00")), Some(2));
        assert_eq!(matched_index(&times, &ts("1991:237:00")), Some(0));
        assert_eq!(matched_index(&times, &ts("1991:238:07L")), None);
        assert_eq!(matched_index(&[], &ts("1991:238:07")), None);
    }

    #[test]
    fn test_closest_index_ties_go_earlier() {
        let times = stamps(&["1991:238:00", "1991:238:06", "1991:238:12"]);
        assert_eq!(closest_index(&times, &ts("1991:238:03")), Some(0));
        assert_eq!(closest_index(&times, &ts("1991:238:04")), Some(1));
        assert_eq!(closest_index(&times, &ts("1991:238:10")), Some(2));
        assert_eq!(closest_index(&times, &ts("1991:240:00")), Some(2));
    }

    #[test]
    fn test_closest_index_skips_other_locality() {
        let times = stamps(&["1991:238:00L", "1991:238:06", "1991:238:12L"]);
        assert_eq!(closest_index(&times, &ts("1991:238:01")), Some(1));
        assert_eq!(closest_index(&times, &ts("1991:238:01L")), Some(0));
    }

    #[test]
    fn test_centred_window() {
        assert_eq!(centred(5, 3, 10), (4, 6));
        assert_eq!(centred(0, 3, 10), (0, 2));
        assert_eq!(centred(9, 4, 10), (6, 9));
        assert_eq!(centred(2, 20, 10), (0, 9));
    }

    #[test]
    fn test_valid_time_list_filters() {
        let temp_dir = TempDir::new().unwrap();
        let env = environ(temp_dir.path());
        let desc = populate(
            &env,
            &[
                "pressure~msl~1991-238-06",
                "pressure~msl~1991-238-00",
                "prmsl_1991:238:12",
                "temperature~surface~1991-238-18",
                "terrain~surface~1991-001-00",
                "pressure~msl~Links",
                "pressure~msl",
                "unknown~msl~1991-238-03",
                "notes.txt",
            ],
        );
        let index = env.index();

        let all: Vec<String> = index
            .valid_time_list(&desc, TimeDepMask::ANY)
            .unwrap()
            .iter()
            .map(Timestamp::to_string)
            .collect();
        assert_eq!(
            all,
            ["1991:001:00", "1991:238:00", "1991:238:06", "1991:238:12", "1991:238:18"]
        );

        let normal = index.valid_time_list(&desc, TimeDepMask::NORMAL).unwrap();
        assert_eq!(normal.len(), 4);

        let mut pressure = desc.clone();
        pressure
            .apply(
                env.registry(),
                [
                    FieldUpdate::ElementName("pressure".into()),
                    FieldUpdate::LevelName("msl".into()),
                ],
            )
            .unwrap();
        let times = index.valid_time_list(&pressure, TimeDepMask::ANY).unwrap();
        assert_eq!(times, stamps(&["1991:238:00", "1991:238:06", "1991:238:12"]));

        let at = pressure.with_valid_time(Some(ts("1991:238:06")));
        assert_eq!(index.valid_time_list(&at, TimeDepMask::ANY).unwrap().len(), 1);
    }

    #[test]
    fn test_field_list_sorted_by_element() {
        let temp_dir = TempDir::new().unwrap();
        let env = environ(temp_dir.path());
        let desc = populate(
            &env,
            &[
                "temperature~surface~1991-238-18",
                "pressure~msl~1991-238-06",
                "prmsl_1991:238:12",
            ],
        );
        let registry = env.registry();
        let names: Vec<&str> = env
            .index()
            .field_list(&desc, TimeDepMask::ANY)
            .unwrap()
            .into_iter()
            .map(|f| registry.element(registry.field(f).element).name.as_str())
            .collect();
        assert_eq!(names, ["pressure", "temperature"]);
    }

    #[test]
    fn test_maps_source_has_no_valid_times() {
        let temp_dir = TempDir::new().unwrap();
        let env = environ(temp_dir.path());
        let desc = env.resolver().descriptor_by_name("maps", "", None).unwrap();
        assert!(env
            .index()
            .valid_time_list(&desc, TimeDepMask::ANY)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_sublist_windows() {
        let temp_dir = TempDir::new().unwrap();
        let env = environ(temp_dir.path());
        let desc = populate(
            &env,
            &[
                "pressure~msl~1991-238-00",
                "pressure~msl~1991-238-06",
                "pressure~msl~1991-238-12",
                "pressure~msl~1991-238-18",
                "pressure~msl~1991-239-00",
            ],
        );
        let index = env.index();
        let window = |w| index.valid_time_sublist(&desc, TimeDepMask::ANY, w).unwrap();

        assert_eq!(
            window(ValidWindow::Between(ts("1991:238:05"), ts("1991:238:13"))),
            stamps(&["1991:238:06", "1991:238:12"])
        );
        assert_eq!(
            window(ValidWindow::From(ts("1991:238:12"), 5)),
            stamps(&["1991:238:12", "1991:238:18", "1991:239:00"])
        );
        assert_eq!(
            window(ValidWindow::Until(ts("1991:238:06"), 3)),
            stamps(&["1991:238:00", "1991:238:06"])
        );
        assert_eq!(
            window(ValidWindow::Around(ts("1991:239:00"), 3)),
            stamps(&["1991:238:12", "1991:238:18", "1991:239:00"])
        );
        assert!(window(ValidWindow::From(ts("1991:238:12"), 0)).is_empty());
    }

    #[test]
    fn test_matched_falls_back_to_all_fields() {
        let temp_dir = TempDir::new().unwrap();
        let env = environ(temp_dir.path());
        let mut desc = populate(&env, &["pressure~msl~1991-238-06"]);
        desc.apply(
            env.registry(),
            [
                FieldUpdate::ElementName("temperature".into()),
                FieldUpdate::LevelName("surface".into()),
            ],
        )
        .unwrap();
        let found = env
            .index()
            .matched_valid_time(&desc, TimeDepMask::ANY, &ts("1991:238:09"))
            .unwrap()
            .unwrap();
        assert_eq!(found.valid_time(), ts("1991:238:06"));
    }

    #[test]
    fn test_match_index_stays_in_list() {
        let times = vec![ts("1991:238:00"), ts("1991:238:06")];
        assert!(ValidTimeMatch::new(times.clone(), 2).is_none());

        let found = ValidTimeMatch::new(times.clone(), 1).unwrap();
        assert_eq!(found.index(), 1);
        assert_eq!(found.times(), times.as_slice());
        assert_eq!(found.valid_time(), ts("1991:238:06"));
        assert_eq!(found.into_times(), times);
    }

    #[test]
    fn test_closest_reset_rewrites_valid_time() {
        let temp_dir = TempDir::new().unwrap();
        let env = environ(temp_dir.path());
        let mut desc = populate(
            &env,
            &["pressure~msl~1991-238-06", "pressure~msl~1991-238-12"],
        );
        desc.apply(
            env.registry(),
            [
                FieldUpdate::ElementName("pressure".into()),
                FieldUpdate::LevelName("msl".into()),
                FieldUpdate::ValidTime("1991:238:10".into()),
            ],
        )
        .unwrap();
        let index = env.index();
        assert!(index
            .closest_valid_time_reset(&mut desc, TimeDepMask::ANY, &ts("1991:238:10"))
            .unwrap());
        assert_eq!(desc.valid_time(), Some(&ts("1991:238:12")));

        assert!(index
            .matched_valid_time_reset(&mut desc, TimeDepMask::ANY, &ts("1991:238:07"))
            .unwrap());
        assert_eq!(desc.valid_time(), Some(&ts("1991:238:12")));
    }

    #[test]
    fn test_daily_local_times_three_days() {
        let temp_dir = TempDir::new().unwrap();
        let env = environ(temp_dir.path());
        let input = populate(
            &env,
            &[
                "temperature~surface~1991-238-06",
                "temperature~surface~1991-238-18",
                "temperature~surface~1991-239-12",
                "temperature~surface~1991-240-22",
            ],
        );
        let daily = FieldDescriptor::with_updates(
            env.registry(),
            [FieldUpdate::ElementName("max_temp".into())],
        )
        .unwrap();

        let times = env
            .index()
            .daily_field_local_times(&daily, &input, TimeDepMask::NORMAL, 0.0)
            .unwrap();
        assert_eq!(
            times,
            stamps(&["1991:238:15L", "1991:239:15L", "1991:240:15L"])
        );
    }

    #[test]
    fn test_daily_local_times_requires_daily_element() {
        let temp_dir = TempDir::new().unwrap();
        let env = environ(temp_dir.path());
        let input = populate(&env, &[]);
        let daily = FieldDescriptor::with_updates(
            env.registry(),
            [FieldUpdate::ElementName("pressure".into())],
        )
        .unwrap();
        assert!(matches!(
            env.index()
                .daily_field_local_times(&daily, &input, TimeDepMask::ANY, 0.0),
            Err(FieldStoreError::NotDaily(_))
        ));
    }

    #[test]
    fn test_valid_range_for_daily() {
        let temp_dir = TempDir::new().unwrap();
        let env = environ(temp_dir.path());
        let input = populate(
            &env,
            &[
                "temperature~surface~1991-237-12",
                "temperature~surface~1991-238-06",
                "temperature~surface~1991-238-12",
                "temperature~surface~1991-238-18",
                "temperature~surface~1991-239-06",
            ],
        );
        let daily = FieldDescriptor::with_updates(
            env.registry(),
            [
                FieldUpdate::ElementName("max_temp".into()),
                FieldUpdate::ValidTime("1991:238:15L".into()),
            ],
        )
        .unwrap();

        let times = env
            .index()
            .valid_range_for_daily(&daily, &input, TimeDepMask::ANY, 0.0)
            .unwrap();
        assert_eq!(
            times,
            stamps(&["1991:238:06", "1991:238:12", "1991:238:18"])
        );
    }

    #[test]
    fn test_check_minutes_in_filenames() {
        let temp_dir = TempDir::new().unwrap();
        let env = environ(temp_dir.path());
        populate(&env, &["pressure~msl~1991-238-06"]);
        assert!(env.index().check_minutes_in_filenames("GEM").unwrap());

        populate(&env, &["pressure~msl~1991-238-06-30"]);
        assert!(!env.index().check_minutes_in_filenames("GEM").unwrap());
    }
}
