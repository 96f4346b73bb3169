use crate::{
    config::{LabelsConfig, Validatable},
    errors::{Result, SegmentationError},
};
use image::Rgb;
use std::{
    fs::File,
    io::{self, BufRead},
    path::Path,
};

const FALLBACK_PALETTE: [[u8; 3]; 6] = [
    [255, 56, 56],
    [255, 157, 151],
    [255, 112, 31],
    [255, 178, 29],
    [207, 210, 49],
    [72, 249, 10],
];

#[derive(Debug, Clone, PartialEq)]
pub struct ClassLabel {
    pub label: String,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

#[derive(Debug, Clone, Default)]
pub struct ClassLabels {
    class_labels: Vec<ClassLabel>,
}

impl ClassLabels {
    pub fn new(class_labels: Vec<ClassLabel>) -> Self {
        Self { class_labels }
    }

    pub fn load(labels_cfg: &LabelsConfig) -> Result<Self> {
        labels_cfg.validate().map_err(SegmentationError::Labels)?;
        match load_labels(&labels_cfg.get_path()) {
            Ok(labels) => Ok(Self::new(labels)),
            Err(e) => Err(SegmentationError::Labels(e.to_string())),
        }
    }

    pub fn get_labels(&self) -> &[ClassLabel] {
        &self.class_labels
    }

    pub fn name(&self, class_id: usize) -> String {
        match self.class_labels.get(class_id) {
            Some(color_label) => color_label.label.clone(),
            None => format!("class {}", class_id),
        }
    }

    pub fn color(&self, class_id: usize) -> Rgb<u8> {
        match self.class_labels.get(class_id) {
            Some(color_label) => Rgb([color_label.red, color_label.green, color_label.blue]),
            None => Rgb(FALLBACK_PALETTE[class_id % FALLBACK_PALETTE.len()]),
        }
    }
}

/// Reads one `label,red,green,blue` line per class id.
pub fn load_labels(filepath: &Path) -> io::Result<Vec<ClassLabel>> {
    let file = File::open(filepath)?;
    let reader = io::BufReader::new(file);
    let mut color_labels = Vec::new();

    for line_result in reader.lines() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split(',').collect();

        if parts.len() == 4 {
            let label = parts[0].trim().to_string();
            let red = parse_channel(parts[1], "red")?;
            let green = parse_channel(parts[2], "green")?;
            let blue = parse_channel(parts[3], "blue")?;

            color_labels.push(ClassLabel {
                label,
                red,
                green,
                blue,
            });
        } else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid line format: {}", line),
            ));
        }
    }

    Ok(color_labels)
}

fn parse_channel(value: &str, channel: &str) -> io::Result<u8> {
    value.trim().parse().map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Invalid {} value: {}", channel, value.trim()),
        )
    })
}
