//! Visualization utilities for rrdt_planner
//!
//! Plots are collected as layers and drawn onto a single gnuplot axes when the
//! figure is shown or saved.

use std::f64::consts::PI;

use gnuplot::{AutoOption, AxesCommon, Caption, Color, Figure, LineWidth, PointSize, PointSymbol};

use crate::common::{CircleObstacle, Path2D, PlannerError, PlannerResult, Point2D};

/// Color palette for consistent styling
pub mod colors {
    pub const BLACK: &str = "#000000";
    pub const RED: &str = "#FF0000";
    pub const GREEN: &str = "#00FF00";
    pub const BLUE: &str = "#0000FF";
    pub const ORANGE: &str = "#FFA500";
    pub const GRAY: &str = "#808080";

    // Semantic colors
    pub const OBSTACLE: &str = BLACK;
    pub const START: &str = GREEN;
    pub const GOAL: &str = BLUE;
    pub const PATH: &str = RED;
    pub const ROOT_TREE: &str = "#35C788";
    pub const DISJOINT_TREE: &str = GRAY;
    pub const PARTICLE: &str = ORANGE;
}

/// Style for line rendering
#[derive(Debug, Clone)]
pub struct PathStyle {
    pub color: String,
    pub line_width: f64,
    pub caption: String,
}

impl PathStyle {
    pub fn new(color: &str, caption: &str) -> Self {
        Self {
            color: color.to_string(),
            line_width: 2.0,
            caption: caption.to_string(),
        }
    }

    pub fn with_line_width(mut self, width: f64) -> Self {
        self.line_width = width;
        self
    }
}

impl Default for PathStyle {
    fn default() -> Self {
        Self {
            color: colors::PATH.to_string(),
            line_width: 2.0,
            caption: "Path".to_string(),
        }
    }
}

/// Style for point rendering
#[derive(Debug, Clone)]
pub struct PointStyle {
    pub color: String,
    pub size: f64,
    pub symbol: char,
    pub caption: String,
}

impl PointStyle {
    pub fn new(color: &str, caption: &str) -> Self {
        Self {
            color: color.to_string(),
            size: 1.0,
            symbol: 'O',
            caption: caption.to_string(),
        }
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = size;
        self
    }

    pub fn with_symbol(mut self, symbol: char) -> Self {
        self.symbol = symbol;
        self
    }
}

#[derive(Debug, Clone)]
enum Layer {
    Lines { x: Vec<f64>, y: Vec<f64>, style: PathStyle },
    Points { x: Vec<f64>, y: Vec<f64>, style: PointStyle },
}

/// Main visualizer struct
pub struct Visualizer {
    figure: Figure,
    layers: Vec<Layer>,
    title: String,
    x_label: String,
    y_label: String,
    x_range: Option<(f64, f64)>,
    y_range: Option<(f64, f64)>,
    aspect_ratio: Option<f64>,
}

impl Visualizer {
    pub fn new() -> Self {
        Self {
            figure: Figure::new(),
            layers: Vec::new(),
            title: String::new(),
            x_label: "X [m]".to_string(),
            y_label: "Y [m]".to_string(),
            x_range: None,
            y_range: None,
            aspect_ratio: Some(1.0),
        }
    }

    pub fn set_title(&mut self, title: &str) -> &mut Self {
        self.title = title.to_string();
        self
    }

    pub fn set_x_label(&mut self, label: &str) -> &mut Self {
        self.x_label = label.to_string();
        self
    }

    pub fn set_y_label(&mut self, label: &str) -> &mut Self {
        self.y_label = label.to_string();
        self
    }

    pub fn set_x_range(&mut self, min: f64, max: f64) -> &mut Self {
        self.x_range = Some((min, max));
        self
    }

    pub fn set_y_range(&mut self, min: f64, max: f64) -> &mut Self {
        self.y_range = Some((min, max));
        self
    }

    /// Set aspect ratio (None for auto)
    pub fn set_aspect_ratio(&mut self, ratio: Option<f64>) -> &mut Self {
        self.aspect_ratio = ratio;
        self
    }

    /// Number of plotted layers so far
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn plot_path(&mut self, path: &Path2D, style: &PathStyle) -> &mut Self {
        self.plot_path_xy(&path.x_coords(), &path.y_coords(), style)
    }

    pub fn plot_path_xy(&mut self, x: &[f64], y: &[f64], style: &PathStyle) -> &mut Self {
        self.layers.push(Layer::Lines {
            x: x.to_vec(),
            y: y.to_vec(),
            style: style.clone(),
        });
        self
    }

    /// Plot unconnected segments as one layer; empty input is ignored
    pub fn plot_segments(&mut self, segments: &[(Point2D, Point2D)], style: &PathStyle) -> &mut Self {
        if segments.is_empty() {
            return self;
        }
        let (x, y) = segment_polyline(segments);
        self.plot_path_xy(&x, &y, style)
    }

    /// Plot circle outlines
    pub fn plot_circles(&mut self, obstacles: &[CircleObstacle]) -> &mut Self {
        if obstacles.is_empty() {
            return self;
        }
        let mut x = Vec::new();
        let mut y = Vec::new();
        for obs in obstacles {
            let (cx, cy) = circle_outline(obs, 36);
            x.extend(cx);
            y.extend(cy);
            x.push(f64::NAN);
            y.push(f64::NAN);
        }
        self.plot_path_xy(&x, &y, &PathStyle::new(colors::OBSTACLE, "Obstacles").with_line_width(1.5))
    }

    /// Plot a single point (start, goal, etc.)
    pub fn plot_point(&mut self, point: Point2D, style: &PointStyle) -> &mut Self {
        self.plot_points(&[point], style)
    }

    pub fn plot_points(&mut self, points: &[Point2D], style: &PointStyle) -> &mut Self {
        self.layers.push(Layer::Points {
            x: points.iter().map(|p| p.x).collect(),
            y: points.iter().map(|p| p.y).collect(),
            style: style.clone(),
        });
        self
    }

    pub fn plot_start(&mut self, point: Point2D) -> &mut Self {
        self.plot_point(point, &PointStyle::new(colors::START, "Start").with_size(1.5))
    }

    pub fn plot_goal(&mut self, point: Point2D) -> &mut Self {
        self.plot_point(point, &PointStyle::new(colors::GOAL, "Goal").with_size(1.5))
    }

    /// Finalize and show the plot
    pub fn show(&mut self) -> PlannerResult<()> {
        self.render();
        self.figure
            .show()
            .map(|_| ())
            .map_err(|e| PlannerError::VisualizationError(e.to_string()))
    }

    pub fn save_png(&mut self, path: &str, width: u32, height: u32) -> PlannerResult<()> {
        self.render();
        self.figure
            .save_to_png(path, width, height)
            .map_err(|e| PlannerError::VisualizationError(e.to_string()))
    }

    pub fn save_svg(&mut self, path: &str) -> PlannerResult<()> {
        self.render();
        self.figure
            .save_to_svg(path, 800, 600)
            .map_err(|e| PlannerError::VisualizationError(e.to_string()))
    }

    fn render(&mut self) {
        self.figure.clear_axes();
        let axes = self.figure.axes2d();

        for layer in &self.layers {
            match layer {
                Layer::Lines { x, y, style } => {
                    axes.lines(x, y, &[
                        Caption(&style.caption),
                        Color(&style.color),
                        LineWidth(style.line_width),
                    ]);
                }
                Layer::Points { x, y, style } => {
                    axes.points(x, y, &[
                        Caption(&style.caption),
                        Color(&style.color),
                        PointSymbol(style.symbol),
                        PointSize(style.size),
                    ]);
                }
            }
        }

        if !self.title.is_empty() {
            axes.set_title(&self.title, &[]);
        }
        axes.set_x_label(&self.x_label, &[]);
        axes.set_y_label(&self.y_label, &[]);

        if let Some((min, max)) = self.x_range {
            axes.set_x_range(AutoOption::Fix(min), AutoOption::Fix(max));
        }
        if let Some((min, max)) = self.y_range {
            axes.set_y_range(AutoOption::Fix(min), AutoOption::Fix(max));
        }
        if let Some(ratio) = self.aspect_ratio {
            axes.set_aspect_ratio(AutoOption::Fix(ratio));
        }
    }
}

impl Default for Visualizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Segments joined into one polyline, separated by NaN breaks
fn segment_polyline(segments: &[(Point2D, Point2D)]) -> (Vec<f64>, Vec<f64>) {
    let mut x = Vec::with_capacity(segments.len() * 3);
    let mut y = Vec::with_capacity(segments.len() * 3);
    for (a, b) in segments {
        x.extend_from_slice(&[a.x, b.x, f64::NAN]);
        y.extend_from_slice(&[a.y, b.y, f64::NAN]);
    }
    (x, y)
}

fn circle_outline(obs: &CircleObstacle, steps: usize) -> (Vec<f64>, Vec<f64>) {
    (0..=steps)
        .map(|i| {
            let t = 2.0 * PI * i as f64 / steps as f64;
            (obs.x + obs.radius * t.cos(), obs.y + obs.radius * t.sin())
        })
        .unzip()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visualizer_creation() {
        let vis = Visualizer::new();
        assert!(vis.aspect_ratio.is_some());
        assert_eq!(vis.layer_count(), 0);
    }

    #[test]
    fn test_path_style() {
        let style = PathStyle::new(colors::RED, "Test Path").with_line_width(3.0);
        assert_eq!(style.line_width, 3.0);
        assert_eq!(style.color, colors::RED);
    }

    #[test]
    fn test_segments_are_broken_by_nan() {
        let segments = [
            (Point2D::new(0.0, 0.0), Point2D::new(1.0, 0.0)),
            (Point2D::new(2.0, 2.0), Point2D::new(3.0, 3.0)),
        ];
        let (x, y) = segment_polyline(&segments);
        assert_eq!(x.len(), 6);
        assert!(x[2].is_nan() && y[5].is_nan());
        assert_eq!(x[3], 2.0);
    }

    #[test]
    fn test_circle_outline_closes() {
        let (x, y) = circle_outline(&CircleObstacle::new(1.0, 2.0, 3.0), 12);
        assert_eq!(x.len(), 13);
        assert!((x[0] - x[12]).abs() < 1e-9 && (y[0] - y[12]).abs() < 1e-9);
        assert!((x[0] - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_inputs_add_no_layer() {
        let mut vis = Visualizer::new();
        vis.plot_segments(&[], &PathStyle::default()).plot_circles(&[]);
        assert_eq!(vis.layer_count(), 0);
        vis.plot_start(Point2D::origin()).plot_goal(Point2D::new(1.0, 1.0));
        assert_eq!(vis.layer_count(), 2);
    }
}
