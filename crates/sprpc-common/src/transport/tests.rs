//! Integration tests for the transport layer
//!
//! These tests drive the response decoder through in-memory pipes, including
//! pipes with tiny capacities so every logical unit arrives split across reads.

#[cfg(test)]
mod tests {
    use crate::protocol::SprpcError;
    use crate::transport::{decode, Connection, Headers, Request, Response};
    use bytes::Bytes;
    use futures_util::StreamExt;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
    use url::Url;

    const HELLO_WORLD: &[u8] = b"HTTP/1.1 200 OK\r\n\
Transfer-Encoding: chunked\r\n\
\r\n\
6\r\nhello \r\n\
6\r\nworld!\r\n\
0\r\n\
\r\n";

    /// Feeds `raw` to the decoder through a pipe that delivers at most
    /// `fragment` bytes per read.
    async fn decode_fragmented(raw: &'static [u8], fragment: usize) -> crate::protocol::Result<Response> {
        let (mut tx, rx) = tokio::io::duplex(fragment);
        tokio::spawn(async move {
            let _ = tx.write_all(raw).await;
        });
        decode(rx).await
    }

    async fn chunked_text(raw: &'static [u8]) -> crate::protocol::Result<String> {
        decode(raw).await?.text().await
    }

    fn encode_chunked(bodies: &[&str]) -> Vec<u8> {
        let mut out = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n".to_vec();
        for body in bodies {
            out.extend_from_slice(format!("{:x}\r\n{}\r\n", body.len(), body).as_bytes());
        }
        out.extend_from_slice(b"0\r\n\r\n");
        out
    }

    #[tokio::test]
    async fn test_simple_chunked_response() {
        let response = decode(HELLO_WORLD).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.status_text, "OK");
        assert_eq!(response.headers.get("transfer-encoding"), Some("chunked"));
        assert_eq!(response.text().await.unwrap(), "hello world!");
    }

    #[tokio::test]
    async fn test_empty_chunked_response() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n0\r\n\r\n";
        assert_eq!(chunked_text(raw).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_chunk_extensions_are_ignored() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n\
6;foo=bar\r\nhello \r\n6;foo=bar\r\nworld!\r\n0\r\n\r\n";
        assert_eq!(chunked_text(raw).await.unwrap(), "hello world!");
    }

    #[tokio::test]
    async fn test_chunk_size_non_hex() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\ng\r\nhello \r\n0\r\n\r\n";
        let err = chunked_text(raw).await.unwrap_err();
        assert!(matches!(err, SprpcError::InvalidChunkSize(_)));
        assert!(err.to_string().contains("invalid chunk size"));
    }

    #[tokio::test]
    async fn test_chunk_size_too_large() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n\
ffffffffffffffffffffffffffffffff\r\nhello \r\n0\r\n\r\n";
        let err = chunked_text(raw).await.unwrap_err();
        assert!(err.to_string().contains("invalid chunk size"));
    }

    #[tokio::test]
    async fn test_eight_digit_chunk_size_is_accepted() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n00000006\r\nhello \r\n0\r\n\r\n";
        assert_eq!(chunked_text(raw).await.unwrap(), "hello ");
    }

    #[tokio::test]
    async fn test_chunk_size_too_small() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n1\r\nhello \r\n0\r\n\r\n";
        let err = chunked_text(raw).await.unwrap_err();
        assert!(matches!(err, SprpcError::InvalidChunkedEncoding));
        assert!(err.to_string().contains("invalid chunked encoding"));
    }

    #[tokio::test]
    async fn test_non_empty_trailers_are_rejected() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n\
6\r\nhello \r\n0\r\nX-Checksum: abc\r\n\r\n";
        let err = chunked_text(raw).await.unwrap_err();
        assert!(matches!(err, SprpcError::TrailersNotSupported));
    }

    #[tokio::test]
    async fn test_decode_is_fragmentation_invariant() {
        let cases: [&[&str]; 4] = [
            &["hello ", "world!"],
            &["a"],
            &["", "x"],
            &["<?xml version=\"1.0\"?>", "<methodResponse>", "</methodResponse>\n"],
        ];

        for bodies in cases {
            let bodies: Vec<&str> = bodies.iter().copied().filter(|b| !b.is_empty()).collect();
            let expected: String = bodies.concat();
            let raw: &'static [u8] = Box::leak(encode_chunked(&bodies).into_boxed_slice());

            for fragment in 1..=17 {
                let response = decode_fragmented(raw, fragment).await.unwrap();
                assert_eq!(
                    response.text().await.unwrap(),
                    expected,
                    "fragment size {}",
                    fragment
                );
            }
        }
    }

    #[tokio::test]
    async fn test_chunks_are_pulled_one_at_a_time() {
        let mut body = decode(HELLO_WORLD).await.unwrap().into_body();
        assert_eq!(body.chunk().await.unwrap(), Some(Bytes::from_static(b"hello ")));
        assert!(!body.is_finished());
        assert_eq!(body.chunk().await.unwrap(), Some(Bytes::from_static(b"world!")));
        assert_eq!(body.chunk().await.unwrap(), None);
        assert!(body.is_finished());
        assert_eq!(body.chunk().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_body_as_stream() {
        let body = decode(HELLO_WORLD).await.unwrap().into_body();
        let chunks: Vec<Bytes> = body
            .into_stream()
            .map(|chunk| chunk.unwrap())
            .collect()
            .await;
        assert_eq!(chunks, vec![Bytes::from_static(b"hello "), Bytes::from_static(b"world!")]);
    }

    #[tokio::test]
    async fn test_content_length_body() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello";
        for fragment in 1..=8 {
            let response = decode_fragmented(raw, fragment).await.unwrap();
            assert_eq!(response.bytes().await.unwrap(), Bytes::from_static(b"hello"));
        }
    }

    #[tokio::test]
    async fn test_content_length_body_too_short() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nhello";
        let err = decode(&raw[..]).await.unwrap_err();
        assert!(matches!(err, SprpcError::NoMoreData));
    }

    #[tokio::test]
    async fn test_invalid_content_length() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: -1\r\n\r\n";
        let err = decode(&raw[..]).await.unwrap_err();
        assert!(matches!(err, SprpcError::InvalidContentLength(_)));
    }

    #[tokio::test]
    async fn test_unknown_body_encoding() {
        let raw = b"HTTP/1.1 200 OK\r\nConnection: close\r\n\r\nbody";
        let err = decode(&raw[..]).await.unwrap_err();
        assert!(matches!(err, SprpcError::UnknownBodyEncoding));
    }

    #[tokio::test]
    async fn test_invalid_status_lines() {
        for line in [
            "HTTP/1.0 200 OK",
            "HTTP/1.1 600 Whatever",
            "HTTP/1.1 099 Low",
            "HTTP/1.1 200",
            "HTTP/1.1 2000 OK",
            "garbage",
        ] {
            let raw: &'static [u8] =
                Box::leak(format!("{}\r\nContent-Length: 0\r\n\r\n", line).into_bytes().into_boxed_slice());
            let err = decode(raw).await.unwrap_err();
            assert!(matches!(err, SprpcError::StatusLine(_)), "{}", line);
            assert!(err.to_string().contains(line), "{}", err);
        }
    }

    #[tokio::test]
    async fn test_status_text_may_contain_spaces() {
        let raw = b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n";
        let response = decode(&raw[..]).await.unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(response.status_text, "Not Found");
    }

    #[tokio::test]
    async fn test_header_line_without_colon() {
        let raw = b"HTTP/1.1 200 OK\r\nnot a header\r\n\r\n";
        let err = decode(&raw[..]).await.unwrap_err();
        assert!(matches!(err, SprpcError::HeaderLine(_)));
    }

    #[tokio::test]
    async fn test_headers_are_trimmed_and_duplicates_kept() {
        let raw = b"HTTP/1.1 200 OK\r\nX-Thing:   one  \r\nx-thing: two\r\nRatio: a:b\r\nContent-Length: 0\r\n\r\n";
        let response = decode(&raw[..]).await.unwrap();
        assert_eq!(response.headers.get_all("X-THING").collect::<Vec<_>>(), vec!["one", "two"]);
        assert_eq!(response.headers.get("ratio"), Some("a:b"));
        assert_eq!(
            response.headers.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            vec!["X-Thing", "x-thing", "Ratio", "Content-Length"]
        );
    }

    #[test]
    fn test_header_lookup_outlives_the_name() {
        let headers: Headers = vec![("Content-Type", "text/xml"), ("content-type", "text/html")]
            .into_iter()
            .collect();
        let value = {
            let name = String::from("CONTENT-TYPE");
            headers.get(&name)
        };
        assert_eq!(value, Some("text/xml"));
        assert!(headers.contains("content-TYPE"));
        assert!(headers.get("accept").is_none());
    }

    #[tokio::test]
    async fn test_end_of_stream_inside_chunk() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\na\r\nhello";
        let err = chunked_text(raw).await.unwrap_err();
        assert!(matches!(err, SprpcError::NoMoreData));
    }

    fn rpc_url() -> Url {
        Url::parse("http://localhost/RPC2").unwrap()
    }

    /// Answers each request (a head without body) with the next canned response.
    fn spawn_server(mut server: DuplexStream, responses: Vec<&'static [u8]>) {
        tokio::spawn(async move {
            for response in responses {
                let mut seen = Vec::new();
                let mut byte = [0u8; 1];
                while !seen.ends_with(b"\r\n\r\n") {
                    if server.read_exact(&mut byte).await.is_err() {
                        return;
                    }
                    seen.push(byte[0]);
                }
                if server.write_all(response).await.is_err() {
                    return;
                }
            }
            // Hold the pipe open until the client hangs up.
            let _ = server.read(&mut [0u8; 1]).await;
        });
    }

    #[tokio::test]
    async fn test_connection_reads_back_to_back_responses() {
        let (client, server) = tokio::io::duplex(64 * 1024);
        spawn_server(
            server,
            vec![
                b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nfirst",
                b"HTTP/1.1 200 OK\r\nContent-Length: 6\r\n\r\nsecond",
            ],
        );

        let connection = Connection::new(client);
        let first = connection.fetch(Request::post(rpc_url())).await.unwrap();
        assert_eq!(first.text().await.unwrap(), "first");
        let second = connection.fetch(Request::post(rpc_url())).await.unwrap();
        assert_eq!(second.text().await.unwrap(), "second");
        assert!(!connection.is_poisoned());
    }

    #[tokio::test]
    async fn test_connection_releases_after_chunked_body() {
        let (client, server) = tokio::io::duplex(64 * 1024);
        spawn_server(server, vec![HELLO_WORLD, HELLO_WORLD]);

        let connection = Connection::new(client);
        for _ in 0..2 {
            let response = connection.fetch(Request::post(rpc_url())).await.unwrap();
            assert_eq!(response.text().await.unwrap(), "hello world!");
        }
        assert!(!connection.is_poisoned());
    }

    #[tokio::test]
    async fn test_abandoned_body_poisons_connection() {
        let (client, server) = tokio::io::duplex(64 * 1024);
        spawn_server(server, vec![HELLO_WORLD, HELLO_WORLD]);

        let connection = Connection::new(client);
        let mut body = connection.fetch(Request::post(rpc_url())).await.unwrap().into_body();
        assert_eq!(body.chunk().await.unwrap(), Some(Bytes::from_static(b"hello ")));
        drop(body);

        assert!(connection.is_poisoned());
        let err = connection.fetch(Request::post(rpc_url())).await.unwrap_err();
        assert!(matches!(err, SprpcError::ConnectionPoisoned));
    }

    #[tokio::test]
    async fn test_trailer_rejection_keeps_connection_usable() {
        let (client, server) = tokio::io::duplex(64 * 1024);
        spawn_server(
            server,
            vec![
                b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n0\r\nX-Sum: 1\r\n\r\n",
                HELLO_WORLD,
            ],
        );

        let connection = Connection::new(client);
        let response = connection.fetch(Request::post(rpc_url())).await.unwrap();
        assert!(matches!(
            response.text().await.unwrap_err(),
            SprpcError::TrailersNotSupported
        ));
        assert!(!connection.is_poisoned());

        let response = connection.fetch(Request::post(rpc_url())).await.unwrap();
        assert_eq!(response.text().await.unwrap(), "hello world!");
    }

    #[tokio::test]
    async fn test_decode_error_poisons_connection() {
        let (client, mut server) = tokio::io::duplex(64 * 1024);
        server.write_all(b"HTTP/1.1 200 OK\r\nno colon\r\n\r\n").await.unwrap();

        let connection = Connection::new(client);
        let err = connection.fetch(Request::post(rpc_url())).await.unwrap_err();
        assert!(matches!(err, SprpcError::HeaderLine(_)));
        assert!(err.is_fatal_to_connection());
        assert!(connection.is_poisoned());
    }

    #[tokio::test]
    async fn test_connection_times_out_waiting_for_response() {
        let (client, _server) = tokio::io::duplex(64 * 1024);
        let connection =
            Connection::new(client).with_timeout(std::time::Duration::from_millis(50));

        let err = connection.fetch(Request::post(rpc_url())).await.unwrap_err();
        assert!(matches!(err, SprpcError::Timeout(50)));
        assert!(err.is_fatal_to_connection());
        assert!(connection.is_poisoned());
    }

    #[tokio::test]
    async fn test_lost_peer_is_fatal() {
        let (client, server) = tokio::io::duplex(64 * 1024);
        drop(server);

        let connection = Connection::new(client);
        let err = connection.fetch(Request::post(rpc_url())).await.unwrap_err();
        assert!(matches!(err, SprpcError::Connection(_)));
        assert!(err.is_fatal_to_connection());
        assert!(connection.is_poisoned());
    }
}
