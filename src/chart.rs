use crate::clock::TimeContext;
use crate::config::{ChartScale, Config};
use crate::energy::{DaySummary, money_value};
use crate::error::RenderError;
use crate::samples::{AggregateSample, StringSample, hour_of_day};
use bigdecimal::BigDecimal;
use jiff::Zoned;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::register_font;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::cell::Cell;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const SIZE: (u32, u32) = (1600, 900);
const BACKGROUND: RGBColor = RGBColor(0x1f, 0x77, 0xb4);
const FONT: &str = "sans-serif";
/// Visible part of the day, in hours.
const X_START: f64 = 5.0;
const X_END: f64 = 23.0;
/// One label on every hour of the window.
const X_LABELS: usize = (X_END - X_START) as usize + 1;
/// One aggregate sample covers a minute.
const BAR_WIDTH: f64 = 1.0 / 60.0;
const BUCKET_WATTS: f64 = 500.0;
const BUCKETS: [RGBColor; 9] = [
    RGBColor(0xF0, 0xFF, 0x00),
    RGBColor(0xF1, 0xDF, 0x00),
    RGBColor(0xF3, 0xBF, 0x00),
    RGBColor(0xF5, 0x9F, 0x00),
    RGBColor(0xF7, 0x7F, 0x00),
    RGBColor(0xF9, 0x5F, 0x00),
    RGBColor(0xFB, 0x3F, 0x00),
    RGBColor(0xFD, 0x1F, 0x00),
    RGBColor(0xFF, 0x00, 0x00),
];

/// Draws a day's chart to an image file.
pub trait ChartRenderer {
    fn render(&self, chart: &DayChart, path: &Path) -> Result<(), RenderError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChartMode {
    /// Daytime redraw, headed with the instantaneous reading.
    Live { watts: BigDecimal },
    /// The day's closing chart.
    DailySummary,
}

/// Everything shown on one chart.
#[derive(Debug, Clone)]
pub struct DayChart {
    pub location: String,
    pub export_label: String,
    pub rendered_at: Zoned,
    pub sunrise: Zoned,
    pub sunset: Zoned,
    pub aggregate: Vec<AggregateSample>,
    pub strings: Vec<StringSample>,
    pub summary: DaySummary,
    pub money: String,
    pub mode: ChartMode,
    pub test: bool,
    /// First transport failure of the run, if any.
    pub status: Option<String>,
}

impl DayChart {
    pub fn new(
        config: &Config,
        ctx: &TimeContext,
        aggregate: Vec<AggregateSample>,
        strings: Vec<StringSample>,
        mode: ChartMode,
        test: bool,
        status: Option<String>,
    ) -> Self {
        let summary = DaySummary::from_samples(&aggregate);
        let money = money_value(&summary.kwh, &config.tariff);
        Self {
            location: config.site.name.clone(),
            export_label: config.tariff.label.clone(),
            rendered_at: ctx.now.clone(),
            sunrise: ctx.sunrise.clone(),
            sunset: ctx.sunset.clone(),
            aggregate,
            strings,
            summary,
            money,
            mode,
            test,
            status,
        }
    }

    /// Chart heading, one line per `\n`.
    pub fn title(&self) -> String {
        let mut title = String::new();
        if self.test {
            title.push_str("-TEST CODE-\n");
        }
        title.push_str(&format!(
            "{} PV at {}\nGenerated {:.2}kWh - {} {}",
            self.location,
            self.rendered_at.strftime("%d/%m/%Y, %H:%M:%S"),
            self.summary.kwh,
            self.export_label,
            self.money
        ));
        match &self.mode {
            ChartMode::DailySummary => title.push_str(" - Daily Summary"),
            ChartMode::Live { watts } => title.push_str(&format!(" - Current Output {watts} W")),
        }
        if let Some(status) = &self.status {
            title.push_str(&format!("\nError: {status}"));
        }
        title
    }

    /// Lines printed under the x axis.
    pub fn footer(&self) -> [String; 3] {
        [
            self.rendered_at.date().to_string(),
            format!("pvmon version: {}", env!("CARGO_PKG_VERSION")),
            format!(
                "Sunrise: {} - Sunset: {}",
                self.sunrise.strftime("%H:%M:%S"),
                self.sunset.strftime("%H:%M:%S")
            ),
        ]
    }
}

/// Bar colour for an aggregate reading, one step redder per 500 W up to red at 4000 W.
pub fn bar_color(watts: f64) -> RGBColor {
    let bucket = (watts / BUCKET_WATTS).floor();
    if bucket.is_nan() || bucket < 0.0 {
        BUCKETS[0]
    } else {
        BUCKETS[(bucket as usize).min(BUCKETS.len() - 1)]
    }
}

fn draw_error(e: impl Display) -> RenderError {
    RenderError::Draw(e.to_string())
}

/// PNG charts drawn with plotters.
#[derive(Debug)]
pub struct PngChart {
    scale: ChartScale,
    string_names: [String; 2],
    font_path: PathBuf,
    font_loaded: Cell<bool>,
}

impl PngChart {
    pub fn new(config: &Config) -> Self {
        Self {
            scale: config.scale,
            string_names: config.strings.clone(),
            font_path: config.font_path.clone(),
            font_loaded: Cell::new(false),
        }
    }

    /// Registers the chart font on first use; runs that draw nothing never read it.
    fn ensure_font(&self) -> Result<(), RenderError> {
        if self.font_loaded.get() {
            return Ok(());
        }
        let font_error = |reason: String| RenderError::Font {
            path: self.font_path.display().to_string(),
            reason,
        };
        let bytes = fs::read(&self.font_path).map_err(|e| font_error(e.to_string()))?;
        // The font registry only holds 'static data.
        let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
        register_font(FONT, FontStyle::Normal, bytes)
            .map_err(|_| font_error("not a usable TrueType font".to_string()))?;
        debug!(path = %self.font_path.display(), "chart font loaded");
        self.font_loaded.set(true);
        Ok(())
    }

    /// One y label per scale step, both ends included.
    fn y_label_count(&self) -> usize {
        let span = self.scale.max.saturating_sub(self.scale.min);
        (span / self.scale.step.max(1)) as usize + 1
    }

    fn draw_plot(
        &self,
        area: &DrawingArea<BitMapBackend<'_>, Shift>,
        chart: &DayChart,
    ) -> Result<(), RenderError> {
        let y_min = f64::from(self.scale.min);
        let y_max = f64::from(self.scale.max);
        let visible = |x: f64| (X_START..X_END).contains(&x);

        let mut cc = ChartBuilder::on(area)
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(80)
            .build_cartesian_2d(X_START..X_END, y_min..y_max)
            .map_err(draw_error)?;

        cc.plotting_area().fill(&BACKGROUND).map_err(draw_error)?;
        cc.configure_mesh()
            .disable_x_mesh()
            .x_labels(X_LABELS)
            .y_labels(self.y_label_count())
            .bold_line_style(WHITE.stroke_width(1))
            .x_label_formatter(&|h: &f64| format!("{:02}:00", *h as u32))
            .y_label_formatter(&|w: &f64| format!("{w:.0}"))
            .y_desc("Generated Electricity (Watts)")
            .label_style((FONT, 16))
            .axis_desc_style((FONT, 20))
            .draw()
            .map_err(draw_error)?;

        cc.draw_series(chart.aggregate.iter().filter_map(|s| {
            let x = hour_of_day(&s.timestamp);
            let watts = s.watts_f64();
            visible(x).then(|| {
                Rectangle::new(
                    [(x, y_min), (x + BAR_WIDTH, watts.clamp(y_min, y_max))],
                    bar_color(watts).filled(),
                )
            })
        }))
        .map_err(draw_error)?;

        let lines: [(&String, RGBColor, fn(&StringSample) -> i64); 2] = [
            (&self.string_names[0], MAGENTA, |s| s.string1),
            (&self.string_names[1], BLUE, |s| s.string2),
        ];
        for (name, color, watts) in lines {
            let points = chart.strings.iter().filter_map(|s| {
                let x = hour_of_day(&s.timestamp);
                visible(x).then(|| (x, (watts(s) as f64).clamp(y_min, y_max)))
            });
            cc.draw_series(LineSeries::new(points, color.stroke_width(1)))
                .map_err(draw_error)?
                .label(name)
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        }

        cc.configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .label_font((FONT, 16))
            .draw()
            .map_err(draw_error)
    }
}

/// Centred lines of text starting at `top`.
fn draw_lines<S: AsRef<str>>(
    area: &DrawingArea<BitMapBackend<'_>, Shift>,
    lines: &[S],
    size: u32,
    top: i32,
) -> Result<(), RenderError> {
    let style = (FONT, size)
        .into_font()
        .color(&BLACK)
        .pos(Pos::new(HPos::Center, VPos::Top));
    let center = area.dim_in_pixel().0 as i32 / 2;
    let line_height = size as i32 + size as i32 / 3;
    for (i, line) in lines.iter().enumerate() {
        area.draw_text(line.as_ref(), &style, (center, top + i as i32 * line_height))
            .map_err(draw_error)?;
    }
    Ok(())
}

impl ChartRenderer for PngChart {
    fn render(&self, chart: &DayChart, path: &Path) -> Result<(), RenderError> {
        const TITLE_SIZE: u32 = 26;
        const FOOTER_SIZE: u32 = 18;

        self.ensure_font()?;

        let title = chart.title();
        let title: Vec<&str> = title.lines().collect();
        let footer = chart.footer();
        let header_height = (TITLE_SIZE + TITLE_SIZE / 3) * title.len() as u32 + 20;
        let footer_height = (FOOTER_SIZE + FOOTER_SIZE / 3) * footer.len() as u32 + 20;

        let root = BitMapBackend::new(path, SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(draw_error)?;
        let (header, rest) = root.split_vertically(header_height);
        let (plot, bottom) = rest.split_vertically(SIZE.1 - header_height - footer_height);

        draw_lines(&header, &title, TITLE_SIZE, 10)?;
        self.draw_plot(&plot, chart)?;
        draw_lines(&bottom, &footer, FOOTER_SIZE, 5)?;

        root.present().map_err(draw_error)
    }
}
