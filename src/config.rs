use bigdecimal::BigDecimal;
use jiff::civil::Date;
use std::path::{Path, PathBuf};

/// Everything that is fixed at deployment time.
///
/// Built once in `main` and handed by reference to every component; nothing reads it from a
/// global.
#[derive(Debug, Clone)]
pub struct Config {
    /// Host (IP or name) of the inverter's Solar API.
    pub inverter_host: String,
    /// IANA name of the local timezone, e.g. `Europe/London`.
    pub timezone: String,
    pub site: Site,
    pub strings: [String; 2],
    pub scale: ChartScale,
    pub tariff: Tariff,
    pub output: OutputLayout,
    /// TTF used for every piece of chart text.
    pub font_path: PathBuf,
    /// Archive samples dropped from the start of each day before the series is stored.
    pub archive_warmup_samples: usize,
    /// Charts are marked as test output.
    pub test_mode: bool,
}

#[derive(Debug, Clone)]
pub struct Site {
    /// Name of the system as it appears in chart titles.
    pub name: String,
    pub latitude: f64,
    /// Degrees, positive east.
    pub longitude: f64,
}

/// Y axis of the chart, in watts.
#[derive(Debug, Clone, Copy)]
pub struct ChartScale {
    pub min: u32,
    pub max: u32,
    pub step: u32,
}

#[derive(Debug, Clone)]
pub struct Tariff {
    pub currency: String,
    /// Value of one exported or self-consumed kWh.
    pub kwh_value: BigDecimal,
    /// "Saved" or "Earned".
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct OutputLayout {
    /// Directory served as the live page (live image, index document).
    pub live_dir: PathBuf,
    /// Directory holding the per-day CSVs and archival images.
    pub archive_dir: PathBuf,
    /// Public path of `archive_dir` as referenced from the index document.
    pub web_path: String,
    pub live_image: String,
    pub summary_csv: String,
    pub index_document: String,
}

impl Config {
    pub fn deployment() -> Self {
        Self {
            inverter_host: "192.168.1.123".to_string(),
            timezone: "Europe/London".to_string(),
            site: Site {
                name: "My House".to_string(),
                latitude: 51.4543,
                longitude: -0.9781,
            },
            strings: ["East Panels".to_string(), "South Panels".to_string()],
            scale: ChartScale {
                min: 0,
                max: 5250,
                step: 250,
            },
            tariff: Tariff {
                currency: "£".to_string(),
                kwh_value: BigDecimal::new(1872i32.into(), 4),
                label: "Saved".to_string(),
            },
            output: OutputLayout {
                live_dir: PathBuf::from("/var/www/html/pvmon"),
                archive_dir: PathBuf::from("/var/www/html/pvmon/data"),
                web_path: "/pvmon/data".to_string(),
                live_image: "currentPwr.png".to_string(),
                summary_csv: "dailytotals.csv".to_string(),
                index_document: "history.html".to_string(),
            },
            font_path: PathBuf::from("/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"),
            archive_warmup_samples: 54,
            test_mode: false,
        }
    }

    /// Same configuration with every file write redirected to `dir`.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        self.output.live_dir = dir.clone();
        self.output.archive_dir = dir;
        self
    }

    /// `-t`: output goes to `dir` and every chart is marked as a test.
    pub fn with_test_output(self, dir: impl Into<PathBuf>) -> Self {
        Self {
            test_mode: true,
            ..self.with_output_dir(dir)
        }
    }
}

/// Files touched on a given day.
#[derive(Debug, Clone)]
pub struct Paths {
    pub aggregate_csv: PathBuf,
    pub string_csv: PathBuf,
    pub archive_image: PathBuf,
    pub summary_csv: PathBuf,
    pub live_image: PathBuf,
    pub index_document: PathBuf,
    /// Reference to `archive_image` as seen from the web server.
    pub archive_image_url: String,
}

impl Paths {
    pub fn for_day(config: &Config, date: Date) -> Self {
        let day = date.to_string();
        let archive: &Path = &config.output.archive_dir;
        let live: &Path = &config.output.live_dir;
        Self {
            aggregate_csv: archive.join(format!("{day}.csv")),
            string_csv: archive.join(format!("{day}-string.csv")),
            archive_image: archive.join(format!("{day}.png")),
            summary_csv: archive.join(&config.output.summary_csv),
            live_image: live.join(&config.output.live_image),
            index_document: live.join(&config.output.index_document),
            archive_image_url: format!(
                "{}/{day}.png",
                config.output.web_path.trim_end_matches('/')
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;

    #[test]
    fn day_paths_follow_the_archive_layout() {
        let config = Config::deployment().with_test_output("/tmp/pv");
        let paths = Paths::for_day(&config, date(2021, 9, 11));

        assert_eq!(paths.aggregate_csv, PathBuf::from("/tmp/pv/2021-09-11.csv"));
        assert_eq!(
            paths.string_csv,
            PathBuf::from("/tmp/pv/2021-09-11-string.csv")
        );
        assert_eq!(paths.archive_image, PathBuf::from("/tmp/pv/2021-09-11.png"));
        assert_eq!(paths.summary_csv, PathBuf::from("/tmp/pv/dailytotals.csv"));
        assert_eq!(paths.live_image, PathBuf::from("/tmp/pv/currentPwr.png"));
        assert_eq!(paths.index_document, PathBuf::from("/tmp/pv/history.html"));
        assert_eq!(paths.archive_image_url, "/pvmon/data/2021-09-11.png");
        assert!(config.test_mode);
    }

    #[test]
    fn redirected_output_is_not_test_output() {
        let config = Config::deployment().with_output_dir("/tmp/pv");
        assert!(!config.test_mode);
        assert_eq!(config.output.live_dir, PathBuf::from("/tmp/pv"));
        assert!(!Config::deployment().test_mode);
    }
}
