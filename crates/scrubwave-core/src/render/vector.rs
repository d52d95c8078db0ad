//! Vector waveform output

use std::fmt;

use crate::types::Rgba;

/// One drawing instruction in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCommand {
    MoveTo { x: f32, y: f32 },
    LineTo { x: f32, y: f32 },
}

/// Commands stroked with a single color
#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub color: Rgba,
    pub commands: Vec<PathCommand>,
}

/// Waveform as per-color strokes of vertical lines, one line per bucket
#[derive(Debug, Clone, PartialEq)]
pub struct VectorWaveform {
    width: u32,
    height: u32,
    strokes: Vec<Stroke>,
}

impl VectorWaveform {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            strokes: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    /// Stroke drawn with `color`, if any
    pub fn stroke(&self, color: Rgba) -> Option<&Stroke> {
        self.strokes.iter().find(|s| s.color == color)
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    /// Number of line segments across all strokes
    pub fn segment_count(&self) -> usize {
        self.strokes
            .iter()
            .flat_map(|s| s.commands.iter())
            .filter(|c| matches!(c, PathCommand::LineTo { .. }))
            .count()
    }

    /// Append a vertical line at `x` from `y1` to `y2`
    pub fn vertical_line(&mut self, color: Rgba, x: f32, y1: f32, y2: f32) {
        let index = match self.strokes.iter().position(|s| s.color == color) {
            Some(index) => index,
            None => {
                self.strokes.push(Stroke {
                    color,
                    commands: Vec::new(),
                });
                self.strokes.len() - 1
            }
        };
        let commands = &mut self.strokes[index].commands;
        commands.push(PathCommand::MoveTo { x, y: y1 });
        commands.push(PathCommand::LineTo { x, y: y2 });
    }

    /// Standalone SVG document
    pub fn to_svg(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for VectorWaveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = self.width,
            h = self.height
        )?;
        for stroke in &self.strokes {
            write!(f, r#"  <path d=""#)?;
            for (i, command) in stroke.commands.iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                match command {
                    PathCommand::MoveTo { x, y } => write!(f, "M{} {}", x, y)?,
                    PathCommand::LineTo { x, y } => write!(f, "L{} {}", x, y)?,
                }
            }
            writeln!(
                f,
                r#"" fill="none" stroke="{}" stroke-opacity="{:.3}" stroke-width="1"/>"#,
                stroke.color.to_hex(),
                stroke.color.opacity()
            )?;
        }
        writeln!(f, "</svg>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_group_by_color() {
        let mut waveform = VectorWaveform::new(4, 10);
        waveform.vertical_line(Rgba::BLUE, 0.0, 2.0, 8.0);
        waveform.vertical_line(Rgba::BLACK, 1.0, 3.0, 7.0);
        waveform.vertical_line(Rgba::BLUE, 2.0, 4.0, 6.0);

        assert_eq!(waveform.strokes().len(), 2);
        assert_eq!(waveform.stroke(Rgba::BLUE).unwrap().commands.len(), 4);
        assert_eq!(waveform.segment_count(), 3);
    }

    #[test]
    fn test_svg_output() {
        let mut waveform = VectorWaveform::new(2, 4);
        waveform.vertical_line(Rgba::new(255, 0, 0, 255), 1.0, 0.5, 3.5);
        let svg = waveform.to_svg();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains(r#"viewBox="0 0 2 4""#));
        assert!(svg.contains(r#"d="M1 0.5 L1 3.5""#));
        assert!(svg.contains(r##"stroke="#ff0000""##));
        assert!(svg.trim_end().ends_with("</svg>"));
    }
}
