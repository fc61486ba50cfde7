use crate::error::TplError;
use crate::tpl::ast::{Expr, Node};
use crate::tpl::expr::{
    is_identifier, parse_expression, parse_quoted, split_top_level, take_quoted,
    top_level_separators,
};
use crate::tpl::scanner::{Mark, MarkKind};

/// 将扫描得到的标记树解析为节点树
pub fn parse(marks: Vec<Mark>) -> Result<Vec<Node>, TplError> {
    marks.into_iter().map(parse_mark).collect()
}

/// scan + parse
pub fn parse_template(template: &str) -> Result<Vec<Node>, TplError> {
    parse(crate::tpl::scanner::scan(template)?)
}

fn parse_mark(mark: Mark) -> Result<Node, TplError> {
    match mark.kind {
        MarkKind::Text => Ok(Node::Text(mark.value)),
        MarkKind::Comment => Ok(Node::Comment(mark.value)),
        MarkKind::Tag => parse_tag(&mark.value),
        MarkKind::Block => parse_block(mark),
    }
}

fn parse_tag(value: &str) -> Result<Node, TplError> {
    if let Some(rest) = strip_keyword(value, "import") {
        return parse_import(rest);
    }
    Ok(Node::Output(parse_expression(value)?))
}

fn parse_block(mark: Mark) -> Result<Node, TplError> {
    let keyword = mark.keyword().to_string();
    match keyword.as_str() {
        "if" => {
            let test = mark.value[keyword.len()..].trim();
            if test.is_empty() {
                return Err(TplError::syntax("invalid if statement"));
            }
            let test = parse_expression(test)?;

            let mut children = mark.children;
            // 末尾的 else 块即为 alternate 分支
            let alternate = match children.last() {
                Some(last) if last.is_else() => {
                    children.pop().map(|m| m.children).unwrap_or_default()
                }
                _ => Vec::new(),
            };

            Ok(Node::If {
                test,
                consequent: parse(children)?,
                alternate: parse(alternate)?,
            })
        }
        "for" => parse_for(&mark.value[keyword.len()..], mark.children),
        "else" | "elseif" => Err(TplError::syntax("unexpected else block")),
        _ => Err(TplError::syntax(format!(
            "invalid block statement: {}",
            mark.value
        ))),
    }
}

/// `for item[, second] in iterable`
fn parse_for(statement: &str, children: Vec<Mark>) -> Result<Node, TplError> {
    let invalid = || TplError::syntax(format!("invalid for statement: for {}", statement.trim()));

    let (vars, iterable) = statement.split_once(" in ").ok_or_else(invalid)?;
    let names: Vec<&str> = vars.split(',').map(str::trim).collect();
    if names.len() > 2 || !names.iter().all(|n| is_identifier(n)) {
        return Err(invalid());
    }
    if iterable.trim().is_empty() {
        return Err(invalid());
    }

    Ok(Node::For {
        item: names[0].to_string(),
        second: names.get(1).map(|n| n.to_string()),
        iterable: parse_expression(iterable)?,
        body: parse(children)?,
    })
}

/// `import 'path' [with { key: expr, ... }]`
fn parse_import(rest: &str) -> Result<Node, TplError> {
    let invalid = || TplError::syntax(format!("invalid import statement: import {}", rest));

    let (path, tail) = take_quoted(rest).ok_or_else(invalid)?;
    if path.trim().is_empty() {
        return Err(invalid());
    }

    let tail = tail.trim();
    let bindings = if tail.is_empty() {
        None
    } else if let Some(object) = strip_keyword(tail, "with") {
        Some(parse_bindings(object)?)
    } else {
        return Err(invalid());
    };

    Ok(Node::Import { path, bindings })
}

fn parse_bindings(object: &str) -> Result<Vec<(String, Expr)>, TplError> {
    let invalid = || TplError::syntax("invalid import variable object");

    let inner = object
        .strip_prefix('{')
        .and_then(|o| o.strip_suffix('}'))
        .ok_or_else(invalid)?;

    let mut entries = split_top_level(inner, ",");
    // 允许末尾多一个逗号，也允许空对象
    if entries.last().is_some_and(|e| e.trim().is_empty()) {
        entries.pop();
    }

    let mut bindings = Vec::with_capacity(entries.len());
    for entry in entries {
        let (colon, _) = top_level_separators(entry, &[':'])
            .next()
            .ok_or_else(invalid)?;
        let key = entry[..colon].trim();
        let key = match parse_quoted(key) {
            Some(k) if !k.is_empty() => k,
            Some(_) => return Err(invalid()),
            None if is_identifier(key) => key.to_string(),
            None => return Err(invalid()),
        };
        let value = entry[colon + 1..].trim();
        if value.is_empty() {
            return Err(invalid());
        }
        bindings.push((key, parse_expression(value)?));
    }
    Ok(bindings)
}

/// 关键字后必须紧跟空白、引号或 `{`
fn strip_keyword<'a>(statement: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = statement.strip_prefix(keyword)?;
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c.is_whitespace() || matches!(c, '\'' | '"' | '{') => Some(rest.trim()),
        _ => None,
    }
}
