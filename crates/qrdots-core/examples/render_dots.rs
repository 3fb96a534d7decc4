//! Renders rounded-dot QR codes to PNG files
//!
//! Usage: cargo run -p qrdots-core --example render_dots -- [logo.png]

use std::fs;
use std::path::Path;

use qrdots_core::{AppConfig, LogoOverlay};

fn main() {
    let output_dir = Path::new("generated_dots");
    fs::create_dir_all(output_dir).unwrap();

    let config = AppConfig::default();
    let mut generator = config.generator();

    if let Some(logo_path) = std::env::args().nth(1) {
        let bytes = fs::read(&logo_path).unwrap();
        let logo = LogoOverlay::from_bytes(&bytes, config.overlay.clone()).unwrap();
        generator.set_logo(Some(logo));
    }

    let payloads: [(&str, &[&str]); 3] = [
        ("url", &["https://github.com/your-org/qrdots"]),
        ("contact", &["Jane Doe", "+1 555 0100", "jane@example.com"]),
        ("text", &["This is a test QR code for the dot renderer."]),
    ];

    for (name, fields) in payloads {
        let generated = generator.generate(fields).unwrap();
        println!(
            "{}: module {}px, radius {:.2}px, {} dots",
            name, generated.report.module_size, generated.report.radius, generated.report.dots
        );
        generated
            .image
            .save(output_dir.join(format!("{}.png", name)))
            .unwrap();
    }

    println!("Saved to {:?}", output_dir);
}
