//! Текст QR-кода: склейка полей при генерации и разбор при показе результата

/// Склейка непустых полей через `\n`; пробелы по краям обрезаются.
/// `None`, если все поля пустые.
pub fn join_fields<S: AsRef<str>>(fields: &[S]) -> Option<String> {
    let parts: Vec<&str> = fields
        .iter()
        .map(|f| f.as_ref().trim())
        .filter(|f| !f.is_empty())
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n"))
    }
}

/// Строки отсканированного текста для отображения
pub fn split_lines(payload: &str) -> Vec<&str> {
    payload.split('\n').collect()
}
