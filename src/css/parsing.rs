//! CSS text parsing.
//!
//! Builds the generic rule model out of cssparser's tokenizer. Selector
//! preludes and declaration values are captured as verbatim source slices,
//! so rendering preserves whatever notation the book's stylesheets used.

use cssparser::{
    AtRuleParser, AtRuleType, CowRcStr, DeclarationListParser, DeclarationParser, ParseError,
    Parser, ParserInput, RuleListParser, SourceLocation,
};

use super::{Declaration, Rule, RuleKind};

/// Parse a stylesheet into rules, dropping anything unparseable.
pub(super) fn parse_rules(css: &str) -> Vec<Rule> {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    RuleListParser::new_for_stylesheet(&mut parser, RuleParser)
        .filter_map(|result| result.ok())
        .collect()
}

/// Parse a bare declaration block, as found in a `style` attribute.
pub fn parse_declarations(text: &str) -> Vec<Declaration> {
    let mut input = ParserInput::new(text);
    let mut parser = Parser::new(&mut input);
    DeclarationListParser::new(&mut parser, BlockParser)
        .filter_map(|result| result.ok())
        .collect()
}

/// Whether an at-rule's block holds nested rules rather than declarations.
fn block_contains_rules(name: &str) -> bool {
    matches!(name, "media" | "supports" | "document" | "-moz-document")
        || name == "keyframes"
        || name.ends_with("-keyframes")
}

/// Consume the remaining tokens and return the raw source they covered.
fn consume_remaining<'i>(input: &mut Parser<'i, '_>) -> &'i str {
    let start = input.position();
    while input.next().is_ok() {}
    input.slice_from(start)
}

struct RuleParser;

impl<'i> cssparser::QualifiedRuleParser<'i> for RuleParser {
    type Prelude = String;
    type QualifiedRule = Rule;
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        Ok(consume_remaining(input).trim().to_string())
    }

    fn parse_block<'t>(
        &mut self,
        prelude: Self::Prelude,
        _location: SourceLocation,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::QualifiedRule, ParseError<'i, Self::Error>> {
        Ok(Rule {
            kind: RuleKind::Style,
            selector: prelude,
            declarations: parse_declaration_block(input),
            rules: Vec::new(),
        })
    }
}

impl<'i> AtRuleParser<'i> for RuleParser {
    type PreludeNoBlock = (String, String);
    type PreludeBlock = (String, String);
    type AtRule = Rule;
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<AtRuleType<Self::PreludeNoBlock, Self::PreludeBlock>, ParseError<'i, Self::Error>>
    {
        let keyword = name.to_string().to_lowercase();
        let prelude = consume_remaining(input).trim().to_string();
        match keyword.as_str() {
            "import" | "charset" | "namespace" => {
                Ok(AtRuleType::WithoutBlock((keyword, prelude)))
            }
            _ => Ok(AtRuleType::WithBlock((keyword, prelude))),
        }
    }

    fn rule_without_block(
        &mut self,
        (keyword, prelude): Self::PreludeNoBlock,
        _location: SourceLocation,
    ) -> Self::AtRule {
        // Block-less at-rules have nothing renderable and drop out at
        // render time.
        Rule {
            kind: RuleKind::from_at_keyword(&keyword),
            selector: prelude,
            declarations: Vec::new(),
            rules: Vec::new(),
        }
    }

    fn parse_block<'t>(
        &mut self,
        (keyword, prelude): Self::PreludeBlock,
        _location: SourceLocation,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::AtRule, ParseError<'i, Self::Error>> {
        let kind = RuleKind::from_at_keyword(&keyword);
        if block_contains_rules(&keyword) {
            let rules = RuleListParser::new_for_nested_rule(input, RuleParser)
                .filter_map(|result| result.ok())
                .collect();
            Ok(Rule {
                kind,
                selector: prelude,
                declarations: Vec::new(),
                rules,
            })
        } else {
            Ok(Rule {
                kind,
                selector: prelude,
                declarations: parse_declaration_block(input),
                rules: Vec::new(),
            })
        }
    }
}

fn parse_declaration_block<'i>(input: &mut Parser<'i, '_>) -> Vec<Declaration> {
    DeclarationListParser::new(input, BlockParser)
        .filter_map(|result| result.ok())
        .collect()
}

struct BlockParser;

impl<'i> DeclarationParser<'i> for BlockParser {
    type Declaration = Declaration;
    type Error = ();

    fn parse_value<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Declaration, ParseError<'i, Self::Error>> {
        let raw = consume_remaining(input);
        let (value, important) = split_important(raw);
        if value.is_empty() {
            return Err(input.new_custom_error(()));
        }
        Ok(Declaration {
            property: name.to_string().to_lowercase(),
            value,
            important,
        })
    }
}

// Declarations never contain at-rules; the defaults reject them.
impl<'i> AtRuleParser<'i> for BlockParser {
    type PreludeNoBlock = ();
    type PreludeBlock = ();
    type AtRule = Declaration;
    type Error = ();
}

/// Split a raw declaration value from its `!important` suffix.
fn split_important(raw: &str) -> (String, bool) {
    let trimmed = raw.trim();
    if trimmed.to_ascii_lowercase().ends_with("important") {
        let head = trimmed[..trimmed.len() - "important".len()].trim_end();
        if let Some(value) = head.strip_suffix('!') {
            return (value.trim_end().to_string(), true);
        }
    }
    (trimmed.to_string(), false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_declarations() {
        let declarations = parse_declarations("text-align: center; margin-top: 1em");
        assert_eq!(declarations.len(), 2);
        assert_eq!(declarations[0], Declaration::new("text-align", "center"));
        assert_eq!(declarations[1], Declaration::new("margin-top", "1em"));
    }

    #[test]
    fn test_parse_declarations_important() {
        let declarations = parse_declarations("color: red ! important;");
        assert_eq!(declarations.len(), 1);
        assert_eq!(declarations[0].value, "red");
        assert!(declarations[0].important);
    }

    #[test]
    fn test_parse_nested_media_rule() {
        let rules = parse_rules("@media screen { h1 { color: red; } p { margin: 0; } }");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].kind, RuleKind::Media);
        assert_eq!(rules[0].selector, "screen");
        assert_eq!(rules[0].rules.len(), 2);
        assert_eq!(rules[0].rules[0].selector, "h1");
    }

    #[test]
    fn test_parse_font_face_holds_declarations() {
        let rules = parse_rules("@font-face { font-family: \"somefont\"; src: url(somefont.ttf); }");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].kind, RuleKind::FontFace);
        assert!(rules[0].rules.is_empty());
        assert_eq!(rules[0].declarations[1].value, "url(somefont.ttf)");
    }

    #[test]
    fn test_parse_recovers_after_bad_rule() {
        let rules = parse_rules("h1 { color: } h2 { color: blue; }");
        // The malformed declaration is dropped, not the whole sheet.
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[1].declarations[0].value, "blue");
    }

    #[test]
    fn test_split_important() {
        assert_eq!(split_important("red !important"), ("red".to_string(), true));
        assert_eq!(
            split_important("red !IMPORTANT"),
            ("red".to_string(), true)
        );
        assert_eq!(split_important("important"), ("important".to_string(), false));
        assert_eq!(
            split_important("url(x) no-repeat"),
            ("url(x) no-repeat".to_string(), false)
        );
    }
}
