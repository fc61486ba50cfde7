use crate::config::MAX_NESTING_DEPTH;
use crate::error::TplError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkKind {
    /// `{% if/elseif/else/for %}`
    Block,
    /// `{{ expr }}`
    Tag,
    /// `{# comment #}`
    Comment,
    Text,
}

/// 扫描阶段的中间单元，块标记持有其内部的子标记
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mark {
    pub kind: MarkKind,
    pub value: String,
    pub children: Vec<Mark>,
}

impl Mark {
    pub fn new(kind: MarkKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            children: Vec::new(),
        }
    }

    pub fn keyword(&self) -> &str {
        keyword_of(&self.value)
    }

    pub fn is_else(&self) -> bool {
        self.kind == MarkKind::Block && self.value == "else"
    }
}

/// 换行与制表符在这些区域内原样保留
const PROTECTED: [(&str, &str); 4] = [
    ("<pre", "</pre>"),
    ("<textarea", "</textarea>"),
    ("<script", "</script>"),
    ("{#", "#}"),
];

fn keyword_of(statement: &str) -> &str {
    statement.split_whitespace().next().unwrap_or("")
}

/// 扫描模板，输出经过嵌套校验的标记树
pub fn scan(input: &str) -> Result<Vec<Mark>, TplError> {
    let normalized = normalize(input);

    let mut marks: Vec<Mark> = Vec::new();
    let mut blocks: Vec<Mark> = Vec::new();
    // only `if` / `for` statements are pushed here
    let mut openings: Vec<String> = Vec::new();

    for unit in split_units(&normalized) {
        if unit.kind != MarkKind::Block {
            emit(&mut marks, &mut blocks, unit);
            continue;
        }

        let keyword = unit.keyword().to_string();
        if !keyword.starts_with("end") && blocks.len() >= MAX_NESTING_DEPTH {
            return Err(TplError::syntax("maximum nesting depth exceeded"));
        }
        match keyword.as_str() {
            "if" | "for" => {
                openings.push(unit.value.clone());
                blocks.push(unit);
            }
            "else" | "elseif" => {
                if keyword == "else" && unit.value != "else" {
                    return Err(TplError::syntax(format!(
                        "invalid block statement: {}",
                        unit.value
                    )));
                }
                let inside_if = openings.last().is_some_and(|s| keyword_of(s) == "if");
                let after_else = blocks.last().is_some_and(Mark::is_else);
                if !inside_if || after_else {
                    return Err(TplError::syntax("unexpected else tag"));
                }
                blocks.push(unit);
            }
            kw if kw.starts_with("end") => {
                let opening = openings
                    .pop()
                    .ok_or_else(|| TplError::syntax("redundant end tag"))?;
                if keyword_of(&opening) != &kw[3..] || unit.value != kw {
                    return Err(TplError::syntax("invalid end tag"));
                }
                let top = blocks
                    .pop()
                    .ok_or_else(|| TplError::syntax("redundant end tag"))?;
                let block = fold_else_chain(top, &mut blocks)?;
                emit(&mut marks, &mut blocks, block);
            }
            _ => {
                return Err(TplError::syntax(format!(
                    "invalid block statement: {}",
                    unit.value
                )));
            }
        }
    }

    if !blocks.is_empty() {
        return Err(TplError::syntax("missing end tag"));
    }

    Ok(marks)
}

/// 将 `if / elseif / else` 链折叠为嵌套的 `if / else` 结构。
///
/// `block` is the block just popped on an end tag; while it is an `else` or
/// `elseif` it is attached as the last child of its predecessor on `stack`.
/// An `elseif X` becomes `else { if X }`, which is exactly the shape a
/// hand-written nested `if/else` produces.
fn fold_else_chain(mut block: Mark, stack: &mut Vec<Mark>) -> Result<Mark, TplError> {
    loop {
        let keyword = block.keyword().to_string();
        let child = match keyword.as_str() {
            "else" => block,
            "elseif" => {
                let test = block.value["elseif".len()..].trim();
                let branch = Mark {
                    kind: MarkKind::Block,
                    value: format!("if {}", test),
                    children: block.children,
                };
                Mark {
                    kind: MarkKind::Block,
                    value: "else".to_string(),
                    children: vec![branch],
                }
            }
            _ => return Ok(block),
        };
        let mut prev = stack
            .pop()
            .ok_or_else(|| TplError::syntax("unexpected else tag"))?;
        prev.children.push(child);
        block = prev;
    }
}

fn emit(marks: &mut Vec<Mark>, blocks: &mut [Mark], mark: Mark) {
    match blocks.last_mut() {
        Some(parent) => parent.children.push(mark),
        None => marks.push(mark),
    }
}

/// 去掉换行与制表符，受保护区域除外
fn normalize(input: &str) -> String {
    // ASCII lowercasing keeps byte offsets identical to `input`
    let lower = input.to_ascii_lowercase();
    let mut out = String::with_capacity(input.len());
    let mut pos = 0;
    while let Some((start, end)) = next_protected(&lower, pos) {
        strip_line_breaks(&mut out, &input[pos..start]);
        out.push_str(&input[start..end]);
        pos = end;
    }
    strip_line_breaks(&mut out, &input[pos..]);
    out
}

fn strip_line_breaks(out: &mut String, s: &str) {
    out.extend(s.chars().filter(|c| !matches!(c, '\n' | '\r' | '\t')));
}

fn next_protected(lower: &str, from: usize) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize)> = None;
    for (open, close) in PROTECTED {
        let Some(start) = find_opener(lower, from, open) else {
            continue;
        };
        if best.is_some_and(|(s, _)| s <= start) {
            continue;
        }
        let body = start + open.len();
        let end = lower[body..]
            .find(close)
            .map_or(lower.len(), |p| body + p + close.len());
        best = Some((start, end));
    }
    best
}

fn find_opener(lower: &str, mut from: usize, open: &str) -> Option<usize> {
    while let Some(p) = lower[from..].find(open) {
        let start = from + p;
        if !open.starts_with('<') {
            return Some(start);
        }
        // `<pre>` / `<pre class=..>` but not `<prefix>`
        match lower[start + open.len()..].chars().next() {
            Some(c) if c == '>' || c == '/' || c.is_whitespace() => return Some(start),
            _ => from = start + open.len(),
        }
    }
    None
}

/// 按 `{% %}`、`{{ }}`、`{# #}` 切分，其余内容均为文本
fn split_units(input: &str) -> Vec<Mark> {
    let bytes = input.as_bytes();
    let mut units = Vec::new();
    let mut text_start = 0;
    let mut pos = 0;

    while let Some(off) = input[pos..].find('{') {
        let start = pos + off;
        let (kind, close) = match bytes.get(start + 1) {
            Some(b'%') => (MarkKind::Block, "%}"),
            Some(b'{') => (MarkKind::Tag, "}}"),
            Some(b'#') => (MarkKind::Comment, "#}"),
            _ => {
                pos = start + 1;
                continue;
            }
        };
        match input[start + 2..].find(close) {
            Some(rel) => {
                let end = start + 2 + rel;
                if start > text_start {
                    units.push(Mark::new(MarkKind::Text, &input[text_start..start]));
                }
                units.push(Mark::new(kind, input[start + 2..end].trim()));
                pos = end + 2;
                text_start = pos;
            }
            // unterminated tag, keep it as text
            None => pos = start + 1,
        }
    }

    if text_start < input.len() {
        units.push(Mark::new(MarkKind::Text, &input[text_start..]));
    }
    units
}
