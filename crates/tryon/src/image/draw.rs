//! Drawing primitives for overlays and debug visualizations.
//!
//! Every function returns a guard object that allows customizing the drawing operation, and
//! performs the drawing when it is dropped.

use std::convert::Infallible;

use embedded_graphics::{
    draw_target::DrawTarget,
    mono_font::{ascii, MonoFont, MonoTextStyle},
    prelude::*,
    primitives::{Line, PrimitiveStyle, Rectangle},
    text::{Alignment, Baseline, Text, TextStyleBuilder},
};
use itertools::Itertools;
use nalgebra::{UnitQuaternion, Vector2, Vector3};

use super::{Color, Image};

/// Text sizes available to [`text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontSize {
    /// 6x10 pixel glyphs.
    Small,
    /// 10x20 pixel glyphs.
    Large,
}

impl FontSize {
    fn font(self) -> &'static MonoFont<'static> {
        match self {
            FontSize::Small => &ascii::FONT_6X10,
            FontSize::Large => &ascii::FONT_10X20,
        }
    }
}

/// Guard returned by [`marker`]; draws the marker when dropped and allows customization.
pub struct DrawMarker<'a> {
    image: &'a mut Image,
    x: i32,
    y: i32,
    color: Color,
    size: u32,
}

impl<'a> DrawMarker<'a> {
    /// Sets the marker's color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the width and height of the marker.
    ///
    /// The default size is 5. The size must be *uneven* and *non-zero*. A size of 1 will result in
    /// a single pixel getting drawn.
    pub fn size(&mut self, size: u32) -> &mut Self {
        assert!(size != 0, "marker size must be greater than zero");
        assert!(size % 2 == 1, "marker size must be an uneven number");
        self.size = size;
        self
    }
}

impl Drop for DrawMarker<'_> {
    fn drop(&mut self) {
        let offset = ((self.size - 1) / 2) as i32;
        let (x, y, color) = (self.x, self.y, self.color);
        let pixels = (-offset..=offset)
            .zip(-offset..=offset)
            .chain((-offset..=offset).rev().zip(-offset..=offset))
            .map(|(xoff, yoff)| Pixel(Point::new(x + xoff, y + yoff), color));
        match Target(&mut *self.image).draw_iter(pixels) {
            Ok(_) => {}
            Err(infallible) => match infallible {},
        }
    }
}

/// Guard returned by [`line`][line()]; draws the line when dropped and allows customization.
pub struct DrawLine<'a> {
    image: &'a mut Image,
    start_x: i32,
    start_y: i32,
    end_x: i32,
    end_y: i32,
    color: Color,
    stroke_width: u32,
}

impl<'a> DrawLine<'a> {
    /// Sets the line's color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the line's stroke width.
    ///
    /// By default, a stroke width of 1 is used.
    pub fn stroke_width(&mut self, width: u32) -> &mut Self {
        self.stroke_width = width;
        self
    }
}

impl<'a> Drop for DrawLine<'a> {
    fn drop(&mut self) {
        match Line::new(
            Point::new(self.start_x, self.start_y),
            Point::new(self.end_x, self.end_y),
        )
        .into_styled(PrimitiveStyle::with_stroke(self.color, self.stroke_width))
        .draw(&mut Target(&mut *self.image))
        {
            Ok(_) => {}
            Err(infallible) => match infallible {},
        }
    }
}

/// Guard returned by [`polyline`]; draws the connected line segments when dropped.
pub struct DrawPolyline<'a> {
    image: &'a mut Image,
    points: Vec<Point>,
    color: Color,
    stroke_width: u32,
}

impl<'a> DrawPolyline<'a> {
    /// Sets the stroke color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the stroke width.
    ///
    /// By default, a stroke width of 1 is used.
    pub fn stroke_width(&mut self, width: u32) -> &mut Self {
        self.stroke_width = width;
        self
    }
}

impl<'a> Drop for DrawPolyline<'a> {
    fn drop(&mut self) {
        let style = PrimitiveStyle::with_stroke(self.color, self.stroke_width);
        for (start, end) in self.points.iter().tuple_windows() {
            match Line::new(*start, *end)
                .into_styled(style)
                .draw(&mut Target(&mut *self.image))
            {
                Ok(_) => {}
                Err(infallible) => match infallible {},
            }
        }
    }
}

/// Guard returned by [`text`]; draws the text when dropped and allows customization.
pub struct DrawText<'a> {
    image: &'a mut Image,
    x: i32,
    y: i32,
    text: &'a str,
    color: Color,
    font: FontSize,
    alignment: Alignment,
    baseline: Baseline,
}

impl<'a> DrawText<'a> {
    /// Sets the text color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the glyph size.
    pub fn font(&mut self, font: FontSize) -> &mut Self {
        self.font = font;
        self
    }

    /// Puts the baseline of the text on the `y` coordinate.
    pub fn align_baseline(&mut self) -> &mut Self {
        self.baseline = Baseline::Alphabetic;
        self
    }

    /// Aligns the left side of the text with the `x` coordinate.
    pub fn align_left(&mut self) -> &mut Self {
        self.alignment = Alignment::Left;
        self
    }
}

impl<'a> Drop for DrawText<'a> {
    fn drop(&mut self) {
        // FIXME: e-g's fonts lack some common glyphs and only come in fixed pixel sizes
        let character_style = MonoTextStyle::new(self.font.font(), self.color);
        let text_style = TextStyleBuilder::new()
            .alignment(self.alignment)
            .baseline(self.baseline)
            .build();
        match Text::with_text_style(
            self.text,
            Point::new(self.x, self.y),
            character_style,
            text_style,
        )
        .draw(&mut Target(&mut *self.image))
        {
            Ok(_) => {}
            Err(infallible) => match infallible {},
        }
    }
}

/// Guard returned by [`quaternion`]; draws the rotated coordinate system when dropped.
pub struct DrawQuaternion<'a> {
    image: &'a mut Image,
    x: i32,
    y: i32,
    quaternion: UnitQuaternion<f32>,
    axis_length: u32,
    stroke_width: u32,
}

impl<'a> DrawQuaternion<'a> {
    /// Sets the stroke width of each coordinate axis.
    pub fn stroke_width(&mut self, width: u32) -> &mut Self {
        self.stroke_width = width;
        self
    }

    /// Sets the length of each coordinate axis, in pixels.
    pub fn axis_length(&mut self, length: u32) -> &mut Self {
        self.axis_length = length;
        self
    }
}

impl<'a> Drop for DrawQuaternion<'a> {
    fn drop(&mut self) {
        let axis_length = self.axis_length as f32;
        let origin = Vector2::new(self.x as f32, self.y as f32);

        for (axis, color) in [
            (Vector3::x(), Color::RED),
            (Vector3::y(), Color::GREEN),
            (Vector3::z(), Color::BLUE),
        ] {
            let dir = (self.quaternion * axis * axis_length).xy();
            // Flip Y axis, since it points up in 3D space but down in image coordinates.
            let end = origin + Vector2::new(dir.x, -dir.y);
            line(&mut *self.image, self.x, self.y, end.x as i32, end.y as i32)
                .color(color)
                .stroke_width(self.stroke_width);
        }
    }
}

/// Draws a marker onto an image.
///
/// This can be used to visualize hand landmarks or points of interest.
pub fn marker(image: &mut Image, x: i32, y: i32) -> DrawMarker<'_> {
    DrawMarker {
        image,
        x,
        y,
        color: Color::from_rgb8(255, 0, 0),
        size: 5,
    }
}

/// Draws a line onto an image.
pub fn line(
    image: &mut Image,
    start_x: i32,
    start_y: i32,
    end_x: i32,
    end_y: i32,
) -> DrawLine<'_> {
    DrawLine {
        image,
        start_x,
        start_y,
        end_x,
        end_y,
        color: Color::from_rgb8(0, 0, 255),
        stroke_width: 1,
    }
}

/// Draws a sequence of connected line segments onto an image.
pub fn polyline(
    image: &mut Image,
    points: impl IntoIterator<Item = (i32, i32)>,
) -> DrawPolyline<'_> {
    DrawPolyline {
        image,
        points: points.into_iter().map(|(x, y)| Point::new(x, y)).collect(),
        color: Color::WHITE,
        stroke_width: 1,
    }
}

/// Draws a text string onto an image.
///
/// By default, the text is drawn centered horizontally and vertically around `x` and `y`, using
/// [`FontSize::Small`].
pub fn text<'a>(image: &'a mut Image, x: i32, y: i32, text: &'a str) -> DrawText<'a> {
    DrawText {
        image,
        x,
        y,
        text,
        color: Color::from_rgb8(255, 0, 0),
        font: FontSize::Small,
        alignment: Alignment::Center,
        baseline: Baseline::Middle,
    }
}

/// Visualizes a rotation in 3D space by drawing XYZ coordinate axes rotated accordingly.
///
/// This assumes that the quaternion describes a rotation in scene coordinates (X points right,
/// Y points up, Z points towards the viewer).
///
/// The `x` and `y` parameters describe where to put the origin of the coordinate system.
pub fn quaternion(
    image: &mut Image,
    x: i32,
    y: i32,
    quaternion: UnitQuaternion<f32>,
) -> DrawQuaternion<'_> {
    DrawQuaternion {
        image,
        x,
        y,
        quaternion,
        axis_length: 10,
        stroke_width: 1,
    }
}

struct Target<'a>(&'a mut Image);

impl Dimensions for Target<'_> {
    fn bounding_box(&self) -> Rectangle {
        let (width, height) = (self.0.width(), self.0.height());

        Rectangle {
            top_left: Point { x: 0, y: 0 },
            size: Size { width, height },
        }
    }
}

impl DrawTarget for Target<'_> {
    type Color = Color;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = embedded_graphics::Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x >= 0
                && (point.x as u32) < self.0.width()
                && point.y >= 0
                && (point.y as u32) < self.0.height()
            {
                self.0.set(point.x as _, point.y as _, color);
            }
        }

        Ok(())
    }
}
