use image::GrayImage;

/// Box corners in original-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn intersection(&self, other: &BoundingBox) -> f32 {
        let w = self.x2.min(other.x2) - self.x1.max(other.x1);
        let h = self.y2.min(other.y2) - self.y1.max(other.y1);
        w.max(0.) * h.max(0.)
    }

    pub fn union(&self, other: &BoundingBox) -> f32 {
        self.area() + other.area() - self.intersection(other)
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let union = self.union(other);
        if union <= 0. {
            return 0.;
        }
        self.intersection(other) / union
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x1 && x < self.x2 && y >= self.y1 && y < self.y2
    }
}

/// Binary (0 or 255) mask covering only the pixels under a detection's box.
///
/// `left`/`top` place the mask's first pixel in original-image coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxMask {
    pub left: u32,
    pub top: u32,
    pub pixels: GrayImage,
}

impl BoxMask {
    /// The pixel region of `bbox`, rounded outwards and clipped to the image.
    pub fn region(bbox: &BoundingBox, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let left = (bbox.x1.floor().max(0.) as u32).min(width);
        let top = (bbox.y1.floor().max(0.) as u32).min(height);
        let right = (bbox.x2.ceil().max(0.) as u32).clamp(left, width);
        let bottom = (bbox.y2.ceil().max(0.) as u32).clamp(top, height);
        (left, top, right - left, bottom - top)
    }

    pub fn right(&self) -> u32 {
        self.left + self.pixels.width()
    }

    pub fn bottom(&self) -> u32 {
        self.top + self.pixels.height()
    }

    /// Whether the mask is set at `(x, y)` in original-image coordinates.
    pub fn is_set(&self, x: u32, y: u32) -> bool {
        if x < self.left || y < self.top || x >= self.right() || y >= self.bottom() {
            return false;
        }
        self.pixels.get_pixel(x - self.left, y - self.top)[0] != 0
    }

    pub fn byte_len(&self) -> usize {
        self.pixels.as_raw().len()
    }
}

#[derive(Debug, Clone)]
pub struct Detection {
    pub class_id: usize,
    pub confidence: f32,
    pub bbox: BoundingBox,
    pub mask: Option<BoxMask>,
}

#[derive(Debug, Clone)]
pub struct Prediction {
    pub width: u32,
    pub height: u32,
    pub detections: Vec<Detection>,
}

impl Prediction {
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            detections: Vec::new(),
        }
    }
}
