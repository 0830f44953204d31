//! End-to-end tests for generation rotation, resolution and valid-time
//! lookup over a registry loaded from TOML.

use alopex_fieldstore::index::ValidWindow;
use alopex_fieldstore::lock::{LockConfig, SHUFFLE_LOCK_FILE};
use alopex_fieldstore::rotation::{chain_run_times, generation_dir, read_stamp, STAMP_FILE};
use alopex_fieldstore::{
    Environ, FieldDescriptor, FieldStoreError, FieldUpdate, MapProjection, Registry, TimeDepMask,
    Timestamp,
};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn config(root: &Path) -> String {
    format!(
        r#"
[directories]
Data = "{}"

[[sources]]
name = "GEM"
type = "guidance"
directory_tag = "Data"
path = "GEM"
layers = 3
subsources = [{{ name = "reg", subpath = "regional" }}]

[[sources]]
name = "depict"
type = "depiction"
directory_tag = "Data"
path = "depict"

[[elements]]
name = "pressure"
file_ident = "pressure"
file_id = "pr"

[[elements]]
name = "max_temp"
file_ident = "max_temp"
file_id = "mx"
time_dependence = "daily"
daily = {{ begin = 0.0, end = 24.0, normal = 15.0 }}

[[levels]]
name = "msl"
file_ident = "msl"
file_id = "msl"

[[levels]]
name = "surface"
file_ident = "surface"
file_id = "sfc"

[[fields]]
element = "pressure"
level = "msl"

[[fields]]
element = "max_temp"
level = "surface"
"#,
        root.display()
    )
}

fn environ(root: &Path) -> Environ {
    let registry = Registry::from_toml_str(&config(root)).unwrap();
    Environ::new(registry).with_lock_config(
        LockConfig::default()
            .with_retry_interval(Duration::from_millis(1))
            .with_drain_attempts(2),
    )
}

fn ts(text: &str) -> Timestamp {
    Timestamp::parse(text).unwrap()
}

fn gem(env: &Environ, rtime: &str, element: &str, level: &str, vtime: &str) -> FieldDescriptor {
    FieldDescriptor::with_updates(
        env.registry(),
        [
            FieldUpdate::SourceName("GEM".into()),
            FieldUpdate::RunTime(rtime.into()),
            FieldUpdate::ElementName(element.into()),
            FieldUpdate::LevelName(level.into()),
            FieldUpdate::ValidTime(vtime.into()),
        ],
    )
    .unwrap()
}

#[test]
fn test_rotation_end_to_end() {
    let temp_dir = TempDir::new().unwrap();
    let env = environ(temp_dir.path());
    let resolver = env.resolver();
    let base = temp_dir.path().join("GEM");

    let first = resolver
        .prepare_source_directory_by_name("GEM", "", Some("1991:238:12"))
        .unwrap();
    assert_eq!(first, base);
    assert!(generation_dir(&base, 2).is_dir());
    assert!(!generation_dir(&base, 3).exists());

    let metafile = env
        .metafiles()
        .construct_meta_filename(&gem(&env, "1991:238:12", "pressure", "msl", "1991:238:18"))
        .unwrap()
        .unwrap();
    fs::write(&metafile, b"run 12").unwrap();

    let second = resolver
        .prepare_source_directory_by_name("GEM", "", Some("1991:239:00"))
        .unwrap();
    assert_eq!(second, base);
    assert_eq!(read_stamp(&base).unwrap(), Some(ts("1991:239:00")));
    assert!(!metafile.exists());
    assert!(!base.join(SHUFFLE_LOCK_FILE).exists());

    let prev = resolver
        .source_directory_by_name("GEM", "", Some("1991:238:12"))
        .unwrap()
        .unwrap();
    assert_eq!(prev, generation_dir(&base, 1));
    assert_eq!(
        fs::read(prev.join("pressure~msl~1991-238-18")).unwrap(),
        b"run 12"
    );

    let desc = gem(&env, "1991:238:12", "pressure", "msl", "1991:238:18");
    assert_eq!(
        env.metafiles().find_meta_filename(&desc).unwrap(),
        Some(prev.join("pressure~msl~1991-238-18"))
    );

    let runs = resolver.source_run_time_list(&desc).unwrap();
    assert_eq!(runs, vec![ts("1991:239:00"), ts("1991:238:12")]);
}

#[test]
fn test_prepare_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let env = environ(temp_dir.path());
    let resolver = env.resolver();

    let first = resolver
        .prepare_source_directory_by_name("GEM", "reg", Some("1991:238:12"))
        .unwrap();
    fs::write(first.join("pressure~msl~1991-238-12"), b"").unwrap();
    let again = resolver
        .prepare_source_directory_by_name("GEM", "reg", Some("1991:238:12"))
        .unwrap();

    assert_eq!(first, again);
    assert_eq!(first, temp_dir.path().join("GEM").join("regional"));
    assert!(again.join("pressure~msl~1991-238-12").exists());
    assert_eq!(chain_run_times(&first), vec![ts("1991:238:12")]);
}

#[test]
fn test_rotation_never_exceeds_layers() {
    let temp_dir = TempDir::new().unwrap();
    let env = environ(temp_dir.path());
    let resolver = env.resolver();
    let base = temp_dir.path().join("GEM");

    let runs = [
        "1991:238:00",
        "1991:238:12",
        "1991:239:00",
        "1991:239:12",
        "1991:240:00",
    ];
    for rtime in runs {
        let dir = resolver
            .prepare_source_directory_by_name("GEM", "", Some(rtime))
            .unwrap();
        assert_eq!(dir, base);
        fs::write(dir.join(format!("run-{}", rtime.replace(':', "-"))), b"").unwrap();

        let times = chain_run_times(&base);
        assert!(times.len() <= 3);
        assert!(times.windows(2).all(|pair| pair[0] > pair[1]));
        assert!(!generation_dir(&base, 3).exists());
    }

    assert_eq!(
        chain_run_times(&base),
        vec![ts("1991:240:00"), ts("1991:239:12"), ts("1991:239:00")]
    );
    assert!(!generation_dir(&base, 2).join("run-1991-238-12").exists());
    assert!(generation_dir(&base, 2).join("run-1991-239-00").exists());

    let err = resolver
        .prepare_source_directory_by_name("GEM", "", Some("1991:238:00"))
        .unwrap_err();
    assert!(matches!(err, FieldStoreError::RunTooOld { .. }));
}

#[test]
fn test_older_run_fills_deeper_generation() {
    let temp_dir = TempDir::new().unwrap();
    let env = environ(temp_dir.path());
    let resolver = env.resolver();
    let base = temp_dir.path().join("GEM");

    resolver
        .prepare_source_directory_by_name("GEM", "", Some("1991:239:00"))
        .unwrap();
    let dir = resolver
        .prepare_source_directory_by_name("GEM", "", Some("1991:238:12"))
        .unwrap();
    assert_eq!(dir, generation_dir(&base, 1));
    assert_eq!(
        fs::read_to_string(dir.join(STAMP_FILE)).unwrap().trim(),
        "1991:238:12"
    );
}

#[test]
fn test_valid_time_lookup() {
    let temp_dir = TempDir::new().unwrap();
    let env = environ(temp_dir.path());
    let dir = env
        .resolver()
        .prepare_source_directory_by_name("GEM", "", Some("1991:238:00"))
        .unwrap();
    for name in [
        "pressure~msl~1991-238-00",
        "pressure~msl~1991-238-06",
        "prmsl_1991:238:12",
        "pressure~msl~1991-238-18",
        "pressure~msl~1991-239-00",
    ] {
        fs::write(dir.join(name), b"").unwrap();
    }

    let index = env.index();
    let desc = gem(&env, "1991:238:00", "pressure", "msl", "");
    let times = index.valid_time_list(&desc, TimeDepMask::ANY).unwrap();
    assert_eq!(times.len(), 5);
    assert_eq!(times[2], ts("1991:238:12"));

    let matched = index
        .matched_valid_time(&desc, TimeDepMask::ANY, &ts("1991:238:14"))
        .unwrap()
        .unwrap();
    assert_eq!(matched.valid_time(), ts("1991:238:12"));
    let closest = index
        .closest_valid_time(&desc, TimeDepMask::ANY, &ts("1991:238:16"))
        .unwrap()
        .unwrap();
    assert_eq!(closest.valid_time(), ts("1991:238:18"));

    let around = index
        .valid_time_sublist(
            &desc,
            TimeDepMask::ANY,
            ValidWindow::Around(ts("1991:239:00"), 3),
        )
        .unwrap();
    assert_eq!(around, times[2..].to_vec());

    let mut wanted = gem(&env, "1991:238:00", "pressure", "msl", "1991:238:10");
    assert!(index
        .closest_valid_time_reset(&mut wanted, TimeDepMask::ANY, &ts("1991:238:10"))
        .unwrap());
    assert_eq!(wanted.valid_time(), Some(&ts("1991:238:12")));
    assert_eq!(
        env.metafiles().find_meta_filename(&wanted).unwrap(),
        Some(dir.join("prmsl_1991:238:12"))
    );
}

#[test]
fn test_daily_times_over_three_days() {
    let temp_dir = TempDir::new().unwrap();
    let env = environ(temp_dir.path());
    let dir = env
        .resolver()
        .prepare_source_directory_by_name("GEM", "", Some("1991:238:00"))
        .unwrap();
    for hour in (0..72).step_by(6) {
        let vtime = ts("1991:238:00").add_hours(hour);
        fs::write(
            dir.join(format!("pressure~msl~{}", vtime.metafile_string())),
            b"",
        )
        .unwrap();
    }

    let input = gem(&env, "1991:238:00", "pressure", "msl", "");
    let mut daily = gem(&env, "1991:238:00", "max_temp", "surface", "");
    daily
        .apply(
            env.registry(),
            [FieldUpdate::MapProjection(Some(MapProjection::new("latlon", 0.0)))],
        )
        .unwrap();

    let times = env
        .index()
        .daily_field_local_times(&daily, &input, TimeDepMask::ANY, daily.center_lon())
        .unwrap();
    assert_eq!(
        times,
        vec![ts("1991:238:15L"), ts("1991:239:15L"), ts("1991:240:15L")]
    );

    let day = daily.with_valid_time(Some(ts("1991:239:15L")));
    let range = env
        .index()
        .valid_range_for_daily(&day, &input, TimeDepMask::ANY, 0.0)
        .unwrap();
    assert_eq!(
        range,
        vec![
            ts("1991:239:00"),
            ts("1991:239:06"),
            ts("1991:239:12"),
            ts("1991:239:18"),
            ts("1991:240:00"),
        ]
    );
}

#[test]
fn test_depiction_is_not_stamped() {
    let temp_dir = TempDir::new().unwrap();
    let env = environ(temp_dir.path());
    let dir = env
        .resolver()
        .prepare_source_directory_by_name("depict", "", None)
        .unwrap();
    assert_eq!(dir, temp_dir.path().join("depict"));
    assert!(!dir.join(STAMP_FILE).exists());
    assert_eq!(
        env.metafiles().depiction_scratch_file().unwrap(),
        Some(dir.join("Scratch"))
    );
}
