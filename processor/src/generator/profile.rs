use anyhow::Context;
use chrono::{DateTime, Duration, TimeZone, Utc};
use ndarray::Array2;
use radcore::config::radar_id;
use radcore::io::fs::volume_file_name;
use radcore::{Field, SensorVolume};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

const MAIN_CONFIG: &str = "main.yml";
const LOCATION_CONFIG: &str = "location.yml";
const PRODUCT_CONFIG: &str = "products.yml";

const PRODUCT_SETTINGS: &str = r#"dataSetList: ['l0:masked', 'l1:echo', 'l1:mean']
masked:
  type: THRESHOLD
  datatype: RADAR001:RAINBOW:dBZ
  threshold_factor: 1.1
  MAKE_GLOBAL: 1
  products:
    STATS: {type: FIELD_STATS}
echo:
  type: RAW
  datatype: [RADAR001:PROC:dBZ_masked]
  products:
    SAVE: {type: SAVEVOL}
mean:
  type: ACCUMULATE
  datatype: RADAR002:RAINBOW:dBZ
  products:
    SAVE: {type: SAVEVOL}
"#;

/// Shape and cadence of a synthetic data tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub radars: usize,
    pub rays: usize,
    pub gates: usize,
    pub volumes: usize,
    pub start: DateTime<Utc>,
    pub period_minutes: i64,
    /// Lag of every secondary radar behind the master.
    pub secondary_offset_secs: i64,
    pub noise: f32,
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            radars: 2,
            rays: 36,
            gates: 128,
            volumes: 6,
            start: Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).single().unwrap_or_default(),
            period_minutes: 5,
            secondary_offset_secs: 30,
            noise: 2.0,
            seed: 0,
        }
    }
}

impl GeneratorConfig {
    fn normalized_rays(&self) -> usize {
        self.rays.max(1)
    }

    fn normalized_gates(&self) -> usize {
        self.gates.max(1)
    }

    pub fn timestamp(&self, volume: usize, radar: usize) -> DateTime<Utc> {
        let offset = if radar == 0 { 0 } else { self.secondary_offset_secs };
        self.start
            + Duration::minutes(self.period_minutes * volume as i64)
            + Duration::seconds(offset)
    }
}

/// Where the generated run lives and the window covering its volumes.
#[derive(Debug, Clone)]
pub struct SyntheticRun {
    pub config_file: PathBuf,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Serialize)]
struct MainFile {
    name: String,
    configpath: PathBuf,
    saveimgbasepath: PathBuf,
    #[serde(rename = "locationConfigFile")]
    location_config_file: &'static str,
    #[serde(rename = "productConfigFile")]
    product_config_file: &'static str,
}

#[derive(Serialize)]
struct LocationFile {
    datapath: Vec<PathBuf>,
    #[serde(rename = "NumRadars")]
    num_radars: usize,
    #[serde(rename = "TimeTol")]
    time_tol: f64,
    #[serde(rename = "ScanPeriod")]
    scan_period: i64,
}

/// Reflectivity-like field: a sine pattern over range with a decaying
/// envelope plus uniform jitter.
fn build_field(config: &GeneratorConfig, rng: &mut StdRng, phase_offset: f32) -> Array2<f32> {
    let rays = config.normalized_rays();
    let gates = config.normalized_gates();
    Array2::from_shape_fn((rays, gates), |(ray, gate)| {
        let base_phase = (gate as f32 / gates as f32) * 2.0 * PI * 4.0
            + ray as f32 / rays as f32 * PI
            + phase_offset;
        let envelope = 0.2 + 0.8 * (1.0 - gate as f32 / gates as f32);
        let jitter = if config.noise > 0.0 {
            rng.gen_range(-config.noise..config.noise)
        } else {
            0.0
        };
        10.0 + 40.0 * envelope * base_phase.sin().abs() + jitter
    })
}

fn write_yaml<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_yaml::to_writer(BufWriter::new(file), value)
        .with_context(|| format!("writing {}", path.display()))
}

/// Writes volumes under `<dir>/data/RADARnnn/` and a three-file config
/// chain rooted at `<dir>/main.yml`.
pub fn synthesize(dir: &Path, config: &GeneratorConfig) -> anyhow::Result<SyntheticRun> {
    let data_dir = dir.join("data");
    let mut rng = StdRng::seed_from_u64(config.seed);

    for radar in 0..config.radars.max(1) {
        let id = radar_id(radar);
        let radar_dir = data_dir.join(&id);
        fs::create_dir_all(&radar_dir)
            .with_context(|| format!("creating {}", radar_dir.display()))?;

        for volume in 0..config.volumes {
            let timestamp = config.timestamp(volume, radar);
            let phase = volume as f32 * 0.25 + radar as f32;
            let mut sensor = SensorVolume::new(id.clone(), timestamp);
            sensor.add_field("dBZ", Field::new("dBZ", build_field(config, &mut rng, phase)), true);

            let path = radar_dir.join(volume_file_name("vol_", timestamp));
            let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
            serde_json::to_writer(BufWriter::new(file), &sensor)
                .with_context(|| format!("writing {}", path.display()))?;
        }
    }

    write_yaml(
        &dir.join(MAIN_CONFIG),
        &MainFile {
            name: "synthetic".into(),
            configpath: dir.to_path_buf(),
            saveimgbasepath: dir.join("products"),
            location_config_file: LOCATION_CONFIG,
            product_config_file: PRODUCT_CONFIG,
        },
    )?;
    write_yaml(
        &dir.join(LOCATION_CONFIG),
        &LocationFile {
            datapath: vec![data_dir],
            num_radars: config.radars.max(1),
            time_tol: 120.0,
            scan_period: config.period_minutes,
        },
    )?;
    let product_path = dir.join(PRODUCT_CONFIG);
    fs::write(&product_path, PRODUCT_SETTINGS)
        .with_context(|| format!("writing {}", product_path.display()))?;

    let last = config.volumes.saturating_sub(1);
    Ok(SyntheticRun {
        config_file: dir.join(MAIN_CONFIG),
        start: config.timestamp(0, 0),
        end: config.timestamp(last, 0),
    })
}
