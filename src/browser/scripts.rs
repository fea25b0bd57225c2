//! In-page JavaScript used by the Chromium driver
//!
//! Each constant is a function declaration. Arguments are passed through
//! `CallFunctionOnParams`, never spliced into the source.

/// Shared helpers, prepended to every script that needs them
const HELPERS: &str = r#"
const __fieldSelector = (el) => {
  if (el.id) return '#' + CSS.escape(el.id);
  const name = el.getAttribute('name');
  if (name) return '[name="' + CSS.escape(name) + '"]';
  return __pathSelector(el);
};
const __labelFor = (el) => {
  if (el.id) {
    const explicit = document.querySelector('label[for="' + CSS.escape(el.id) + '"]');
    if (explicit) return explicit.innerText.trim();
  }
  const wrapping = el.closest('label');
  return wrapping ? wrapping.innerText.trim() : (el.getAttribute('aria-label') || '');
};
const __describeField = (el) => ({
  tag: el.tagName.toLowerCase(),
  type: (el.getAttribute('type') || (el.tagName === 'TEXTAREA' ? 'textarea' : el.tagName === 'SELECT' ? 'select' : 'text')).toLowerCase(),
  name: el.getAttribute('name') || '',
  id: el.id || '',
  placeholder: el.getAttribute('placeholder') || '',
  label: __labelFor(el),
  required: el.required === true || el.getAttribute('aria-required') === 'true',
  selector: __fieldSelector(el),
});
const __buttonSelector = (el) => {
  if (el.id) return '#' + CSS.escape(el.id);
  const name = el.getAttribute('name');
  if (name) return el.tagName.toLowerCase() + '[name="' + CSS.escape(name) + '"]';
  const form = el.closest('form');
  const type = el.getAttribute('type');
  if (form && form.id && type) {
    return '#' + CSS.escape(form.id) + ' ' + el.tagName.toLowerCase() + '[type="' + CSS.escape(type) + '"]';
  }
  return __pathSelector(el);
};
const __describeButton = (el) => ({
  tag: el.tagName.toLowerCase(),
  type: (el.getAttribute('type') || (el.tagName === 'BUTTON' ? 'submit' : '')).toLowerCase(),
  text: (el.innerText || el.value || '').trim(),
  id: el.id || '',
  className: typeof el.className === 'string' ? el.className : '',
  selector: __buttonSelector(el),
});
const __fieldsIn = (root) => Array.from(root.querySelectorAll('input, textarea, select'))
  .filter((el) => !['hidden', 'submit', 'button', 'reset', 'image'].includes((el.getAttribute('type') || '').toLowerCase()));
const __buttonsIn = (root) => Array.from(root.querySelectorAll('button, input[type="submit"], input[type="button"]'));
const __pathSelector = (el) => {
  if (el.id) return '#' + CSS.escape(el.id);
  const parts = [];
  let node = el;
  while (node && node.nodeType === 1 && node !== document.body) {
    if (node.id) { parts.unshift('#' + CSS.escape(node.id)); break; }
    let nth = 1;
    let sib = node;
    while ((sib = sib.previousElementSibling)) { if (sib.tagName === node.tagName) nth++; }
    parts.unshift(node.tagName.toLowerCase() + ':nth-of-type(' + nth + ')');
    node = node.parentElement;
  }
  return parts.join(' > ');
};
"#;

/// `() => FieldDescriptor[]` for every visible input on the page
pub const FORM_FIELDS: &str = r#"function() {
  __HELPERS__
  return __fieldsIn(document).map(__describeField);
}"#;

/// `() => ButtonDescriptor[]`
pub const BUTTONS: &str = r#"function() {
  __HELPERS__
  return __buttonsIn(document).map(__describeButton);
}"#;

/// `(queries: string[]) => PageSnapshot`
pub const SNAPSHOT: &str = r#"function(queries) {
  __HELPERS__
  const containers = Array.from(document.querySelectorAll('form'));
  const queryHits = new Map();
  for (const query of queries) {
    let matched = [];
    try { matched = Array.from(document.querySelectorAll(query)); } catch (e) { continue; }
    for (const el of matched) {
      let target = el.tagName === 'FORM' ? el : (el.closest('form') || el.querySelector('form'));
      if (!target && __fieldsIn(el).length > 0) target = el;
      if (!target) continue;
      if (!containers.includes(target)) containers.push(target);
      if (!queryHits.has(target)) queryHits.set(target, []);
      if (!queryHits.get(target).includes(query)) queryHits.get(target).push(query);
    }
  }
  const nearbyText = (el) => {
    const texts = [];
    el.querySelectorAll('legend, label, h1, h2, h3, h4').forEach((n) => texts.push(n.innerText));
    let prev = el.previousElementSibling;
    for (let i = 0; prev && i < 3; i++, prev = prev.previousElementSibling) texts.push(prev.innerText || '');
    const section = el.closest('section, article, aside, div');
    if (section) section.querySelectorAll('h1, h2, h3, h4').forEach((n) => texts.push(n.innerText));
    return texts.join(' ').replace(/\s+/g, ' ').trim().slice(0, 2000);
  };
  return {
    url: window.location.href,
    title: document.title,
    containers: containers.map((el, index) => ({
      index,
      tag: el.tagName.toLowerCase(),
      selector: __pathSelector(el),
      id: el.id || '',
      className: typeof el.className === 'string' ? el.className : '',
      action: el.getAttribute('action') || '',
      fields: __fieldsIn(el).map(__describeField),
      buttons: __buttonsIn(el).map(__describeButton),
      nearbyText: nearbyText(el),
      matchedSelectors: queryHits.get(el) || [],
    })),
  };
}"#;

/// `(selector: string) => string[]`
pub const LINK_HREFS: &str = r#"function(selector) {
  return Array.from(document.querySelectorAll(selector))
    .map((el) => el.href || el.getAttribute('href') || '')
    .filter((href) => href.length > 0);
}"#;

/// `(selector: string, value: string) => string | null`
///
/// Matches on option value first, then on visible label.
pub const SELECT_OPTION: &str = r#"function(selector, value) {
  const el = document.querySelector(selector);
  if (!el || !el.options) return null;
  const wanted = String(value).trim().toLowerCase();
  const option = Array.from(el.options).find((o) =>
    o.value === value || o.value.toLowerCase() === wanted || o.text.trim().toLowerCase() === wanted);
  if (!option) return null;
  el.value = option.value;
  el.dispatchEvent(new Event('input', { bubbles: true }));
  el.dispatchEvent(new Event('change', { bubbles: true }));
  return option.value;
}"#;

/// `(selector: string) => boolean`, clears an input and notifies listeners
pub const CLEAR_VALUE: &str = r#"function(selector) {
  const el = document.querySelector(selector);
  if (!el) return false;
  el.value = '';
  el.dispatchEvent(new Event('input', { bubbles: true }));
  return true;
}"#;

/// `(selector: string) => boolean`
///
/// True when clicking the element would submit a form: a submit or image
/// input, or a button whose type is submit (the default inside a form).
/// Clicks on a button's inner content count as clicks on the button.
pub const IS_SUBMIT_CONTROL: &str = r#"function(selector) {
  let el = null;
  try { el = document.querySelector(selector); } catch (e) { return false; }
  if (!el) return false;
  const control = el.closest('button, input') || el;
  const type = (control.getAttribute('type') || '').toLowerCase();
  if (control.tagName === 'INPUT') return type === 'submit' || type === 'image';
  if (control.tagName !== 'BUTTON') return false;
  if (type === 'submit') return true;
  return type === '' && control.form !== null;
}"#;

/// `(x: number, y: number) => void`
pub const SCROLL_BY: &str = "(x, y) => window.scrollBy(x, y)";

/// Splice the shared helpers into a script body
pub fn with_helpers(script: &str) -> String {
    script.replace("__HELPERS__", HELPERS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helpers_are_spliced_once() {
        let script = with_helpers(SNAPSHOT);
        assert!(!script.contains("__HELPERS__"));
        assert!(script.contains("const __pathSelector"));
        assert!(script.starts_with("function(queries)"));
    }

    #[test]
    fn test_synthesized_selectors_escape_ids_and_fall_back_to_path() {
        let helpers = with_helpers(BUTTONS);
        assert!(!helpers.contains("'#' + el.id"));
        assert!(helpers.contains("'#' + CSS.escape(el.id)"));
        // neither selector builder gives up with an empty string
        assert!(!helpers.contains("return '';"));
        assert_eq!(helpers.matches("return __pathSelector(el);").count(), 2);
    }
}
