// JavaScript evaluated inside the page over CDP.

use std::sync::LazyLock;

use crate::page::selectors;

/// Reads every child of the feed container. Children after the first get
/// their "See more" control clicked before their text is read; the first
/// child is the composer row and is left untouched.
pub(crate) static EXTRACT_FEED_CHILDREN: LazyLock<String> = LazyLock::new(|| {
    format!(
        r#"(() => {{
  const feed = document.querySelector({feed});
  if (!feed) return null;
  return Array.from(feed.children).map((child, index) => {{
    let seeMore = null;
    let expansionError = null;
    if (index > 0) {{
      seeMore = Array.from(child.querySelectorAll({button}))
        .find((b) => b.textContent.trim() === {label}) || null;
      if (seeMore) {{
        try {{
          seeMore.click();
        }} catch (err) {{
          expansionError = String((err && err.message) || err);
        }}
      }}
    }}
    const container = child.querySelector({container});
    const description = child.querySelector({description});
    const preview = child.querySelector({preview});
    return {{
      markup: container ? container.outerHTML : null,
      descriptionText: description ? description.textContent : null,
      previewText: preview ? preview.textContent : null,
      hasSeeMore: seeMore !== null,
      expansionError,
    }};
  }});
}})()"#,
        feed = js_string(selectors::FEED),
        button = js_string(selectors::BUTTON),
        label = js_string(selectors::SEE_MORE_LABEL),
        container = js_string(selectors::CONTENT_CONTAINER),
        description = js_string(selectors::DESCRIPTION),
        preview = js_string(selectors::PREVIEW_MESSAGE),
    )
});

pub(crate) fn element_present(selector: &str) -> String {
    format!("document.querySelector({}) !== null", js_string(selector))
}

pub(crate) fn scroll_by_viewport(factor: f64) -> String {
    format!("window.scrollBy(0, window.innerHeight * {factor})")
}

fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}
