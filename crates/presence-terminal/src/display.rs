//! Terminal rendering of the current code

use presence_core::GeneratedCode;

/// Render the code as a QR code using Unicode half blocks
pub fn qr_code_unicode(code: &GeneratedCode) -> String {
    use qrcode::render::unicode;
    use qrcode::QrCode;

    match QrCode::new(code.code.as_bytes()) {
        Ok(qr) => qr
            .render::<unicode::Dense1x2>()
            .dark_color(unicode::Dense1x2::Light)
            .light_color(unicode::Dense1x2::Dark)
            .build(),
        Err(e) => {
            tracing::warn!(error = %e, "QR code generation failed");
            format!("(QR code unavailable: {e})")
        }
    }
}

/// One-line text form, e.g. `123 456  (expires in 17s)`
pub fn code_line(code: &GeneratedCode, now: u64) -> String {
    format!(
        "{}  (expires in {}s)",
        group_digits(&code.code),
        code.seconds_remaining(now)
    )
}

/// Split a code into groups of three for reading aloud
fn group_digits(code: &str) -> String {
    let chars: Vec<char> = code.chars().collect();
    chars
        .chunks(3)
        .map(|chunk| chunk.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(" ")
}
