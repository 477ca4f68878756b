#[cfg(test)]
mod scanner_tests {
    use treelox::error::LoxError;
    use treelox::scanner::Scanner;
    use treelox::token::{Token, TokenType};

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
    fn maximal_munch_operators() {
        assert_token_sequence(
            "! != = == < <= > >= ==!",
            &[
                (TokenType::BANG, "!"),
                (TokenType::BANG_EQUAL, "!="),
                (TokenType::EQUAL, "="),
                (TokenType::EQUAL_EQUAL, "=="),
                (TokenType::LESS, "<"),
                (TokenType::LESS_EQUAL, "<="),
                (TokenType::GREATER, ">"),
                (TokenType::GREATER_EQUAL, ">="),
                (TokenType::EQUAL_EQUAL, "=="),
                (TokenType::BANG, "!"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_token_sequence(
            "and class else false fun for if import nil or print return super this true var while andy _x x9",
            &[
                (TokenType::AND, "and"),
                (TokenType::CLASS, "class"),
                (TokenType::ELSE, "else"),
                (TokenType::FALSE, "false"),
                (TokenType::FUN, "fun"),
                (TokenType::FOR, "for"),
                (TokenType::IF, "if"),
                (TokenType::IMPORT, "import"),
                (TokenType::NIL, "nil"),
                (TokenType::OR, "or"),
                (TokenType::PRINT, "print"),
                (TokenType::RETURN, "return"),
                (TokenType::SUPER, "super"),
                (TokenType::THIS, "this"),
                (TokenType::TRUE, "true"),
                (TokenType::VAR, "var"),
                (TokenType::WHILE, "while"),
                (TokenType::IDENTIFIER, "andy"),
                (TokenType::IDENTIFIER, "_x"),
                (TokenType::IDENTIFIER, "x9"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn numbers_keep_their_values() {
        let tokens: Vec<Token<'_>> = Scanner::new(b"123 3.14 0.5")
            .filter_map(Result::ok)
            .collect();

        let values: Vec<f64> = tokens
            .iter()
            .filter_map(|t| match t.token_type {
                TokenType::NUMBER(n) => Some(n),
                _ => None,
            })
            .collect();

        assert_eq!(values, vec![123.0, 3.14, 0.5]);
    }

    #[test]
    fn trailing_dot_is_not_part_of_a_number() {
        // "123." scans as the number 123 followed by a DOT token
        assert_token_sequence(
            "123.",
            &[
                (TokenType::NUMBER(0.0), "123"),
                (TokenType::DOT, "."),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn string_literal_contents() {
        let tokens: Vec<Token<'_>> = Scanner::new(b"\"hello world\"")
            .filter_map(Result::ok)
            .collect();

        match &tokens[0].token_type {
            TokenType::STRING(s) => assert_eq!(s, "hello world"),
            other => panic!("expected string token, got {:?}", other),
        }

        assert_eq!(tokens[0].lexeme, "\"hello world\"");
    }

    #[test]
    fn multiline_string_tracks_lines() {
        let tokens: Vec<Token<'_>> = Scanner::new(b"\"a\nb\"\nx")
            .filter_map(Result::ok)
            .collect();

        // the identifier after the two-line string sits on line 3
        assert_eq!(tokens[1].token_type, TokenType::IDENTIFIER);
        assert_eq!(tokens[1].line, 3);
    }

    #[test]
    fn unterminated_string_reports_opening_line() {
        let results: Vec<Result<Token<'_>, LoxError>> =
            Scanner::new(b"ok\n\"starts here\nnever ends").collect();

        let err = results
            .iter()
            .find_map(|r| r.as_ref().err())
            .expect("expected an unterminated string error");

        let rendered = err.to_string();
        assert!(
            rendered.contains("Unterminated string"),
            "unexpected message: {}",
            rendered
        );
        // reported at the line the string opened, not where input ran out
        assert!(rendered.contains("[line 2]"), "unexpected line: {}", rendered);
    }

    #[test]
    fn comments_and_whitespace_are_skipped() {
        assert_token_sequence(
            "// full line\nprint 1; // trailing\n// eof comment",
            &[
                (TokenType::PRINT, "print"),
                (TokenType::NUMBER(0.0), "1"),
                (TokenType::SEMICOLON, ";"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn unexpected_characters_are_errors_in_stream() {
        let results: Vec<_> = Scanner::new(b",.$(#").collect();

        // COMMA, DOT, error for '$', LEFT_PAREN, error for '#', EOF
        assert_eq!(results.len(), 6);

        let error_count = results.iter().filter(|r| r.is_err()).count();
        assert_eq!(error_count, 2);

        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(
                err.to_string().contains("Unexpected character"),
                "unexpected message: {}",
                err
            );
        }

        // scanning continued after each error
        let kinds: Vec<TokenType> = results
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
                TokenType::EOF,
            ]
        );
    }

    #[test]
    fn exactly_one_eof_token() {
        let mut scanner = Scanner::new(b"1");

        let kinds: Vec<_> = scanner.by_ref().filter_map(Result::ok).collect();
        assert_eq!(kinds.last().unwrap().token_type, TokenType::EOF);

        // fused: nothing after the EOF token
        assert!(scanner.next().is_none());
    }
}
