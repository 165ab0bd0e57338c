use betalox::scanner::Scanner;
use betalox::token::{Token, TokenType};

fn assert_token_sequence(source: &str, expected: &[(TokenType, &str)]) {
    let scanner = Scanner::new(source.as_bytes());
    let tokens: Vec<_> = scanner.filter_map(Result::ok).collect();

    assert_eq!(tokens.len(), expected.len());

    for (actual, (expected_type, expected_lexeme)) in tokens.iter().zip(expected.iter()) {
        assert_eq!(actual.token_type, *expected_type);
        assert_eq!(actual.lexeme, *expected_lexeme);
    }
}

#[test]
fn symbols() {
    assert_token_sequence(
        "({*.,+*})",
        &[
            (TokenType::LEFT_PAREN, "("),
            (TokenType::LEFT_BRACE, "{"),
            (TokenType::STAR, "*"),
            (TokenType::DOT, "."),
            (TokenType::COMMA, ","),
            (TokenType::PLUS, "+"),
            (TokenType::STAR, "*"),
            (TokenType::RIGHT_BRACE, "}"),
            (TokenType::RIGHT_PAREN, ")"),
            (TokenType::EOF, ""),
        ],
    );
}

#[test]
fn operators() {
    assert_token_sequence(
        "! != = == < <= > >= / //ignored",
        &[
            (TokenType::BANG, "!"),
            (TokenType::BANG_EQUAL, "!="),
            (TokenType::EQUAL, "="),
            (TokenType::EQUAL_EQUAL, "=="),
            (TokenType::LESS, "<"),
            (TokenType::LESS_EQUAL, "<="),
            (TokenType::GREATER, ">"),
            (TokenType::GREATER_EQUAL, ">="),
            (TokenType::SLASH, "/"),
            (TokenType::EOF, ""),
        ],
    );
}

#[test]
fn keywords_and_identifiers() {
    assert_token_sequence(
        "class Foo < Bar { init() { break; } } fun lambda while_x",
        &[
            (TokenType::CLASS, "class"),
            (TokenType::IDENTIFIER, "Foo"),
            (TokenType::LESS, "<"),
            (TokenType::IDENTIFIER, "Bar"),
            (TokenType::LEFT_BRACE, "{"),
            (TokenType::IDENTIFIER, "init"),
            (TokenType::LEFT_PAREN, "("),
            (TokenType::RIGHT_PAREN, ")"),
            (TokenType::LEFT_BRACE, "{"),
            (TokenType::BREAK, "break"),
            (TokenType::SEMICOLON, ";"),
            (TokenType::RIGHT_BRACE, "}"),
            (TokenType::RIGHT_BRACE, "}"),
            (TokenType::FUN, "fun"),
            (TokenType::IDENTIFIER, "lambda"),
            (TokenType::IDENTIFIER, "while_x"),
            (TokenType::EOF, ""),
        ],
    );
}

#[test]
fn number_literals_carry_values() {
    let tokens: Vec<Token> = Scanner::new(b"12 3.5 0.25")
        .collect::<Result<_, _>>()
        .unwrap();

    let values: Vec<f64> = tokens
        .iter()
        .filter_map(|t| match t.token_type {
            TokenType::NUMBER(n) => Some(n),
            _ => None,
        })
        .collect();

    assert_eq!(values, vec![12.0, 3.5, 0.25]);
}

#[test]
fn string_literals_strip_quotes_and_span_lines() {
    let tokens: Vec<Token> = Scanner::new(b"\"hello\" \"a\nb\"")
        .collect::<Result<_, _>>()
        .unwrap();

    match &tokens[0].token_type {
        TokenType::STRING(s) => assert_eq!(s, "hello"),
        other => panic!("expected string, got {:?}", other),
    }

    match &tokens[1].token_type {
        TokenType::STRING(s) => assert_eq!(s, "a\nb"),
        other => panic!("expected string, got {:?}", other),
    }

    // Newline inside the literal bumps the line counter for what follows.
    assert_eq!(tokens[2].token_type, TokenType::EOF);
    assert_eq!(tokens[2].line, 2);
}

#[test]
fn unterminated_string_is_an_error() {
    let results: Vec<_> = Scanner::new(b"\"oops").collect();

    assert!(results.iter().any(|r| r.is_err()));
}

#[test]
fn unexpected_characters_are_reported_and_scanning_continues() {
    let results: Vec<_> = Scanner::new(b",.$(#").collect();

    // COMMA, DOT, error for '$', LEFT_PAREN, error for '#', EOF.
    assert_eq!(results.len(), 6);

    let error_count = results.iter().filter(|r| r.is_err()).count();
    assert_eq!(error_count, 2);

    let kinds: Vec<_> = results
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .map(|t| t.token_type.clone())
        .collect();

    assert_eq!(
        kinds,
        vec![
            TokenType::COMMA,
            TokenType::DOT,
            TokenType::LEFT_PAREN,
            TokenType::EOF
        ]
    );
}

#[test]
fn line_numbers_track_newlines_and_comments() {
    let source = "var a = 1;\n// comment line\nvar b = 2;";
    let tokens: Vec<Token> = Scanner::new(source.as_bytes())
        .collect::<Result<_, _>>()
        .unwrap();

    let b_token = tokens
        .iter()
        .find(|t| t.lexeme == "b")
        .expect("token for 'b'");

    assert_eq!(b_token.line, 3);
}
