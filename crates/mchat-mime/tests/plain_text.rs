//! Extraction tests against realistic client output.

#![allow(clippy::unwrap_used)]

use mchat_mime::{Message, address};
use proptest::prelude::*;

const GMAIL_REPLY: &[u8] = b"Delivered-To: me@example.com\r\n\
Received: by 2002:a05:6402:1234 with SMTP id abc;\r\n\
\tMon, 2 Jan 2006 15:04:05 -0800 (PST)\r\n\
From: Alice Example <alice@example.com>\r\n\
To: me@example.com\r\n\
Subject: Re: Notification from MChat\r\n\
Date: Mon, 2 Jan 2006 15:04:05 -0800\r\n\
Message-ID: <CAF=abc@mail.gmail.com>\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/alternative; boundary=\"000000000000a1b2c3\"\r\n\
\r\n\
--000000000000a1b2c3\r\n\
Content-Type: text/plain; charset=\"UTF-8\"\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\
\r\n\
Who's there?=20\r\n\
\r\n\
On Mon, Jan 2, 2006 at 3:00 PM <me@example.com> wrote:\r\n\
\r\n\
> Knock knock\r\n\
--000000000000a1b2c3\r\n\
Content-Type: text/html; charset=\"UTF-8\"\r\n\
\r\n\
<div>Who's there?</div>\r\n\
--000000000000a1b2c3--\r\n";

#[test]
fn test_gmail_reply_plain_part() {
    let message = Message::parse(GMAIL_REPLY).unwrap();
    assert_eq!(message.message_id(), Some("<CAF=abc@mail.gmail.com>"));
    assert!(message.headers.contains("Delivered-To"));

    let text = message.plain_text().unwrap();
    assert!(text.starts_with("Who's there? \r\n"));
    assert!(text.contains("> Knock knock"));
    assert!(!text.contains("<div>"));
}

#[test]
fn test_deep_single_leaf() {
    let raw = b"Content-Type: multipart/mixed; boundary=a\r\n\
\r\n\
--a\r\n\
Content-Type: multipart/related; boundary=b\r\n\
\r\n\
--b\r\n\
Content-Type: multipart/alternative; boundary=c\r\n\
\r\n\
--c\r\n\
Content-Type: text/plain\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
ZGVlcCBsZWFm\r\n\
--c--\r\n\
--b--\r\n\
--a--\r\n";
    assert_eq!(Message::parse(raw).unwrap().plain_text().unwrap(), "deep leaf");
}

proptest! {
    #[test]
    fn parse_list_only_yields_addresses(input in ".{0,120}") {
        for addr in address::parse_list(&input) {
            prop_assert!(!addr.email.is_empty());
            prop_assert_eq!(addr.email.trim(), addr.email.as_str());
        }
    }

    #[test]
    fn bare_addresses_survive(local in "[a-z0-9.]{1,12}", domain in "[a-z]{1,10}\\.(com|org|net)") {
        let email = format!("{local}@{domain}");
        let list = address::parse_list(&format!("Someone <{email}>, {email}"));
        prop_assert_eq!(list.len(), 2);
        prop_assert_eq!(&list[0].email, &email);
        prop_assert_eq!(&list[1].email, &email);
    }

    #[test]
    fn plain_text_never_panics(body in proptest::collection::vec(any::<u8>(), 0..256)) {
        let mut raw = b"Content-Type: multipart/mixed; boundary=x\r\n\r\n".to_vec();
        raw.extend_from_slice(&body);
        let _ = Message::parse(&raw).unwrap().plain_text();
    }
}
