// crates/qalam-engine/src/lexer/tests.rs

use pretty_assertions::assert_eq;

use super::{tokenize, Keyword, Token};

fn frag(line: u32, text: &str) -> Token {
    Token::Fragment {
        line,
        text: text.to_string(),
    }
}

fn inline(line: u32, expr: &str) -> Token {
    Token::Inline {
        line,
        expr: expr.to_string(),
    }
}

fn directive(line: u32, keyword: Keyword, arg: &str) -> Token {
    Token::Directive {
        line,
        keyword,
        arg: arg.to_string(),
    }
}

#[test]
fn test_plain_text_keeps_terminators() {
    let tokens = tokenize("one\ntwo\r\nthree", "main").unwrap();
    assert_eq!(
        tokens,
        vec![frag(1, "one\n"), frag(2, "two\r\n"), frag(3, "three")]
    );
}

#[test]
fn test_directives_are_recognized_with_leading_whitespace() {
    let tokens = tokenize("  @if x > 1\n@endif\n", "main").unwrap();
    assert_eq!(
        tokens,
        vec![
            directive(1, Keyword::If, "x > 1"),
            directive(2, Keyword::Endif, ""),
        ]
    );
}

#[test]
fn test_comment_lines_vanish() {
    let tokens = tokenize("@ a comment\n@\ntext\n", "main").unwrap();
    assert_eq!(tokens, vec![frag(3, "text\n")]);
}

#[test]
fn test_at_without_keyword_is_literal_text() {
    let tokens = tokenize("@notakeyword\nuser@example.com\n", "main").unwrap();
    assert_eq!(
        tokens,
        vec![frag(1, "@notakeyword\n"), frag(2, "user@example.com\n")]
    );
}

#[test]
fn test_keyword_needs_a_word_boundary() {
    // `@iffy` is not `@if`.
    let tokens = tokenize("@iffy\n", "main").unwrap();
    assert_eq!(tokens, vec![frag(1, "@iffy\n")]);
}

#[test]
fn test_inline_sites_split_the_line() {
    let tokens = tokenize("a @{x + 1} b\n", "main").unwrap();
    assert_eq!(
        tokens,
        vec![frag(1, "a "), inline(1, "x + 1"), frag(1, " b\n")]
    );
}

#[test]
fn test_inline_site_at_line_start_and_end() {
    let tokens = tokenize("@{x}\n", "main").unwrap();
    assert_eq!(tokens, vec![inline(1, "x"), frag(1, "\n")]);
}

#[test]
fn test_inline_expression_may_contain_braces_in_strings() {
    let tokens = tokenize("v = @{\"}\" + x}!\n", "main").unwrap();
    assert_eq!(
        tokens,
        vec![frag(1, "v = "), inline(1, "\"}\" + x"), frag(1, "!\n")]
    );
}

#[test]
fn test_shortest_closer_wins_when_longer_does_not_parse() {
    let tokens = tokenize("@{x} }\n", "main").unwrap();
    assert_eq!(tokens, vec![inline(1, "x"), frag(1, " }\n")]);
}

#[test]
fn test_unparseable_inline_site_is_a_syntax_error() {
    let err = tokenize("text @{not valid +} more\n", "main").unwrap_err();
    assert_eq!(err.to_string(), "Syntax error in @{...} (main:1)");

    let err = tokenize("@{}\n", "main").unwrap_err();
    assert_eq!(err.to_string(), "Syntax error in @{...} (main:1)");

    let err = tokenize("@{never closed\n", "main").unwrap_err();
    assert_eq!(err.line, 1);
}

#[test]
fn test_directive_argument_comments_are_stripped() {
    let tokens = tokenize("@set x 1 // the counter\n", "main").unwrap();
    assert_eq!(tokens, vec![directive(1, Keyword::Set, "x 1")]);
}

#[test]
fn test_comment_stripping_spares_quoted_slashes() {
    let tokens = tokenize("@include \"https://example.com/a.txt\" // remote\n", "main").unwrap();
    assert_eq!(
        tokens,
        vec![directive(1, Keyword::Include, "\"https://example.com/a.txt\"")]
    );
}

#[test]
fn test_all_keywords_tokenize() {
    let source = "@include x\n@set a 1\n@if a\n@elseif b\n@else\n@endif\n@macro m()\n@endmacro\n@while a\n@endwhile\n@repeat 2\n@endrepeat\n@error \"e\"\n@warning \"w\"\n@end\n";
    let tokens = tokenize(source, "main").unwrap();
    let keywords: Vec<Keyword> = tokens
        .iter()
        .filter_map(|t| match t {
            Token::Directive { keyword, .. } => Some(*keyword),
            _ => None,
        })
        .collect();
    assert_eq!(
        keywords,
        vec![
            Keyword::Include,
            Keyword::Set,
            Keyword::If,
            Keyword::Elseif,
            Keyword::Else,
            Keyword::Endif,
            Keyword::Macro,
            Keyword::Endmacro,
            Keyword::While,
            Keyword::Endwhile,
            Keyword::Repeat,
            Keyword::Endrepeat,
            Keyword::Error,
            Keyword::Warning,
            Keyword::End,
        ]
    );
}

#[test]
fn test_empty_lines_are_preserved_as_fragments() {
    let tokens = tokenize("a\n\nb\n", "main").unwrap();
    assert_eq!(tokens, vec![frag(1, "a\n"), frag(2, "\n"), frag(3, "b\n")]);
}
