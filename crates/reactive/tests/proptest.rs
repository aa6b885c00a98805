//! Property-based tests for goban-reactive using proptest.

use goban_core::{Identity, Message, User, IDENTITY_LEN};
use goban_mirror::TableMirror;
use goban_reactive::{MessageFeed, NameResolver, PresenceLog};
use proptest::prelude::*;
use std::rc::Rc;

fn identity(byte: u8) -> Identity {
    Identity::new([byte; IDENTITY_LEN])
}

fn name() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some(String::new())),
        "[a-zA-Z]{1,12}".prop_map(Some),
    ]
}

proptest! {
    /// The resolved name is the set name when non-empty, else the first
    /// eight hex characters of the identity.
    #[test]
    fn display_name_fallback(bytes in prop::array::uniform32(any::<u8>()), name in name()) {
        let users = Rc::new(TableMirror::new());
        let resolver = NameResolver::new(users.clone());
        let id = Identity::new(bytes);
        users.apply_insert(User::new(id, name.clone(), true)).unwrap();

        let expected = match name.as_deref() {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => hex_prefix(&bytes),
        };
        prop_assert_eq!(resolver.resolve(&id), expected);
    }

    /// The feed is non-decreasing by sent time after any insert sequence.
    #[test]
    fn feed_sorted_by_sent(inserts in prop::collection::vec((0u8..4, 0u64..50), 0..100)) {
        let messages = Rc::new(TableMirror::new());
        let users = Rc::new(TableMirror::new());
        let feed = MessageFeed::new(&messages, &users);

        for (i, (sender, sent)) in inserts.iter().enumerate() {
            messages
                .apply_insert(Message::new(identity(*sender), format!("m{}", i), *sent))
                .unwrap();
        }

        let sent: Vec<u64> = feed.ordered_messages().map(|e| e.sent().as_micros()).collect();
        prop_assert_eq!(sent.len(), inserts.len());
        prop_assert!(sent.windows(2).all(|w| w[0] <= w[1]));
    }

    /// Renaming a sender re-annotates its entries and leaves the order alone.
    #[test]
    fn rename_keeps_feed_order(
        inserts in prop::collection::vec((0u8..4, 0u64..20), 1..60),
        renamed in 0u8..4,
    ) {
        let messages = Rc::new(TableMirror::new());
        let users = Rc::new(TableMirror::new());
        let feed = MessageFeed::new(&messages, &users);
        for sender in 0u8..4 {
            users.apply_insert(User::new(identity(sender), None, true)).unwrap();
        }
        for (i, (sender, sent)) in inserts.iter().enumerate() {
            messages
                .apply_insert(Message::new(identity(*sender), format!("m{}", i), *sent))
                .unwrap();
        }

        let before: Vec<String> = feed.ordered_messages().map(|e| e.text().to_string()).collect();
        let target = identity(renamed);
        users
            .apply_update(
                User::new(target, None, true),
                User::new(target, Some("Renamed".to_string()), true),
            )
            .unwrap();

        let after: Vec<_> = feed.ordered_messages().collect();
        let texts: Vec<String> = after.iter().map(|e| e.text().to_string()).collect();
        prop_assert_eq!(texts, before);
        for entry in &after {
            if *entry.sender() == target {
                prop_assert_eq!(entry.sender_name.as_str(), "Renamed");
            } else {
                prop_assert_eq!(entry.sender_name.clone(), entry.sender().short_hex());
            }
        }
    }

    /// Exactly one line per online-flag flip.
    #[test]
    fn presence_lines_match_flips(flags in prop::collection::vec(any::<bool>(), 1..40)) {
        let users = Rc::new(TableMirror::new());
        let log = PresenceLog::new(&users);
        let id = identity(7);

        users.apply_insert(User::new(id, None, flags[0])).unwrap();
        let mut expected = usize::from(flags[0]);
        for pair in flags.windows(2) {
            users
                .apply_update(User::new(id, None, pair[0]), User::new(id, None, pair[1]))
                .unwrap();
            if pair[0] != pair[1] {
                expected += 1;
            }
        }
        prop_assert_eq!(log.len(), expected);
    }
}

fn hex_prefix(bytes: &[u8; IDENTITY_LEN]) -> String {
    bytes[..4].iter().map(|b| format!("{:02x}", b)).collect()
}
