use ammonia;

/// Clean HTML content using the ammonia library.
///
/// Question stems and options are authored in the admin panel and rendered
/// by a browser, so everything ingested there passes through this
/// whitelist-based sanitizer: safe markup (like <b>, <p>) survives,
/// dangerous tags (<script>, <iframe>) and attributes (onclick) do not.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

/// Sanitizes a whole option list. Grading matches option text by equality,
/// so the correct-answer text must be cleaned with the same pass or a
/// sanitized option would no longer match its raw answer text.
pub fn clean_options(options: &[String]) -> Vec<String> {
    options.iter().map(|opt| clean_html(opt)).collect()
}
