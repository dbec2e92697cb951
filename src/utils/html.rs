/// Sanitizes author-supplied rich text (question statements, options, explanations).
///
/// Whitelist-based: formatting tags such as <b>, <sub>, <sup> survive while
/// <script>, <iframe> and event-handler attributes are removed together with
/// script contents.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
