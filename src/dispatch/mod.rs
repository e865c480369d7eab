//! Action dispatch: recognizes this contract's payloads, decodes the action and
//! its arguments, and invokes the registered handler.

mod action;
pub mod envelope;

pub use action::{ActionArgs, ActionParam, ActionRegistry, Handler, ParsedAction};
pub use envelope::{PayloadFormat, encode_binary_action, encode_text_action, encode_text_args};

use crate::codec::BinaryReader;
use crate::config::BalConfig;
use crate::error::BalError;
use crate::name::Name;
use action::ActionEntry;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseResult {
    ParseOk,
    ParseFailed,
    /// Decoded, but the payload held bytes or arguments past the declared parameters.
    ExtraData,
    /// Not addressed to this contract.
    WrongMagic,
}

impl ParseResult {
    pub fn as_str(self) -> &'static str {
        match self {
            ParseResult::ParseOk => "parse_ok",
            ParseResult::ParseFailed => "parse_failed",
            ParseResult::ExtraData => "extra_data",
            ParseResult::WrongMagic => "wrong_magic",
        }
    }
}

pub struct Dispatcher<C> {
    contract_name: String,
    magic: Vec<u8>,
    actions: Vec<ActionEntry<C>>,
    by_name: HashMap<Name, usize>,
    max_decode_depth: usize,
    log_payloads: bool,
}

impl<C> std::fmt::Debug for Dispatcher<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("contract_name", &self.contract_name)
            .field("actions", &self.actions.len())
            .finish()
    }
}

impl<C: 'static> Dispatcher<C> {
    pub fn new(config: &BalConfig, registry: ActionRegistry<C>) -> Result<Self, BalError> {
        config.validate()?;
        let actions = registry.actions;
        let by_name = actions
            .iter()
            .enumerate()
            .map(|(i, entry)| (entry.name, i))
            .collect();
        Ok(Self {
            contract_name: config.contract_name.clone(),
            magic: config.magic().into_bytes(),
            actions,
            by_name,
            max_decode_depth: config.max_decode_depth,
            log_payloads: config.log_payloads,
        })
    }

    pub fn contract_name(&self) -> &str {
        &self.contract_name
    }

    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    pub fn action_names(&self) -> impl Iterator<Item = Name> + '_ {
        self.actions.iter().map(|a| a.name)
    }

    /// Classifies `payload` and decodes it when it is addressed to this contract.
    ///
    /// An action is returned for `ParseOk` and `ExtraData`; nothing has run yet.
    pub fn parse(&self, payload: &[u8]) -> (ParseResult, Option<ParsedAction<C>>) {
        if self.actions.is_empty() || !payload.starts_with(&self.magic) {
            return (ParseResult::WrongMagic, None);
        }
        let body = &payload[self.magic.len()..];
        let Some((&format, rest)) = body.split_first() else {
            self.reject(payload, "valid magic but empty action body");
            return (ParseResult::ParseFailed, None);
        };
        let parsed = match PayloadFormat::from_byte(format) {
            Some(PayloadFormat::Binary) => self.parse_binary(rest),
            Some(PayloadFormat::Text) => self.parse_text(rest),
            None => Err(BalError::Decode(format!(
                "unknown payload format byte {format:#04x}"
            ))),
        };
        match parsed {
            Ok((action, extra)) => {
                if extra {
                    if self.log_payloads {
                        warn!(
                            contract = %self.contract_name,
                            action = %action.name,
                            payload = %hex::encode(payload),
                            "action decoded with extra data left over"
                        );
                    } else {
                        warn!(
                            contract = %self.contract_name,
                            action = %action.name,
                            "action decoded with extra data left over"
                        );
                    }
                    (ParseResult::ExtraData, Some(action))
                } else {
                    debug!(
                        contract = %self.contract_name,
                        action = %action.name,
                        discriminant = action.discriminant,
                        "action decoded"
                    );
                    (ParseResult::ParseOk, Some(action))
                }
            }
            Err(err) => {
                self.reject(payload, &err.to_string());
                (ParseResult::ParseFailed, None)
            }
        }
    }

    /// Runs a decoded action against `contract`.
    pub fn dispatch(&self, contract: &mut C, action: ParsedAction<C>) -> Result<(), BalError> {
        debug!(
            contract = %self.contract_name,
            action = %action.name,
            "dispatching action"
        );
        action.call.invoke(contract)
    }

    fn reject(&self, payload: &[u8], reason: &str) {
        if self.log_payloads {
            warn!(
                contract = %self.contract_name,
                reason,
                payload = %hex::encode(payload),
                "action payload rejected"
            );
        } else {
            warn!(contract = %self.contract_name, reason, "action payload rejected");
        }
    }

    fn parse_binary(&self, body: &[u8]) -> Result<(ParsedAction<C>, bool), BalError> {
        let mut reader = BinaryReader::new(body);
        let discriminant = reader.read_uvarint()?;
        let index = usize::try_from(discriminant)
            .ok()
            .filter(|i| *i < self.actions.len())
            .ok_or_else(|| {
                BalError::Decode(format!(
                    "discriminant {discriminant} does not name one of {} actions",
                    self.actions.len()
                ))
            })?;
        let entry = &self.actions[index];
        let call = entry
            .parser
            .parse_binary(&mut reader, self.max_decode_depth)?;
        let extra = reader.remaining() > 0;
        Ok((
            ParsedAction {
                discriminant: index,
                name: entry.name,
                call,
            },
            extra,
        ))
    }

    fn parse_text(&self, body: &[u8]) -> Result<(ParsedAction<C>, bool), BalError> {
        let body = trim_start(body);
        if body.is_empty() {
            return Err(BalError::Decode("empty text action body".into()));
        }
        let name_len = body
            .iter()
            .position(u8::is_ascii_whitespace)
            .unwrap_or(body.len());
        let (token, rest) = body.split_at(name_len);
        let token = std::str::from_utf8(token)
            .map_err(|e| BalError::Decode(format!("action name is not utf-8: {e}")))?;
        let name = Name::from_str(token)?;
        let index = *self
            .by_name
            .get(&name)
            .ok_or_else(|| BalError::Decode(format!("no action named {name}")))?;
        let entry = &self.actions[index];
        let param_count = entry.parser.param_count();

        let (call, extra) = if param_count == 0 {
            (entry.parser.parse_json(&[])?, !trim_start(rest).is_empty())
        } else {
            let mut stream = serde_json::Deserializer::from_slice(rest).into_iter::<Vec<Value>>();
            let args = match stream.next() {
                Some(Ok(args)) => args,
                Some(Err(e)) => {
                    return Err(BalError::Decode(format!("arguments are not a JSON array: {e}")));
                }
                None => return Err(BalError::Decode("missing argument array".into())),
            };
            let trailing = !trim_start(&rest[stream.byte_offset()..]).is_empty();
            if args.len() < param_count {
                return Err(BalError::Decode(format!(
                    "action {name} takes {param_count} arguments, {} given",
                    args.len()
                )));
            }
            for arg in &args[..param_count] {
                if json_depth(arg) > self.max_decode_depth {
                    return Err(BalError::ResourceExceeded(
                        "maximum decode depth reached".into(),
                    ));
                }
            }
            let call = entry.parser.parse_json(&args)?;
            (call, trailing || args.len() > param_count)
        };
        Ok((
            ParsedAction {
                discriminant: index,
                name,
                call,
            },
            extra,
        ))
    }
}

fn trim_start(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    &bytes[start..]
}

fn json_depth(value: &Value) -> usize {
    match value {
        Value::Array(items) => 1 + items.iter().map(json_depth).max().unwrap_or(0),
        Value::Object(fields) => 1 + fields.values().map(json_depth).max().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::{ActionRegistry, Dispatcher, ParseResult, encode_binary_action};
    use crate::config::BalConfig;
    use crate::error::BalError;
    use crate::name::Name;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<(&'static str, Vec<u64>)>,
    }

    impl Recorder {
        fn first(&mut self) -> Result<(), BalError> {
            self.calls.push(("first", vec![]));
            Ok(())
        }

        fn second(&mut self, a: u64) -> Result<(), BalError> {
            self.calls.push(("second", vec![a]));
            Ok(())
        }

        fn third(&mut self, a: u64, b: Vec<u64>) -> Result<(), BalError> {
            let mut args = vec![a];
            args.extend(b);
            self.calls.push(("third", args));
            Ok(())
        }
    }

    fn dispatcher() -> Dispatcher<Recorder> {
        let mut registry = ActionRegistry::new();
        registry
            .action(Name::new("first"), Recorder::first)
            .expect("first")
            .action(Name::new("second"), Recorder::second)
            .expect("second")
            .action(Name::new("third"), Recorder::third)
            .expect("third");
        Dispatcher::new(&BalConfig::new("recorder"), registry).expect("dispatcher")
    }

    #[test]
    fn duplicate_action_names_are_rejected() {
        let mut registry = ActionRegistry::<Recorder>::new();
        registry
            .action(Name::new("first"), Recorder::first)
            .expect("first");
        assert!(registry.action(Name::new("first"), Recorder::second).is_err());
    }

    #[test]
    fn empty_contract_never_matches() {
        let dispatcher =
            Dispatcher::<Recorder>::new(&BalConfig::new("recorder"), ActionRegistry::new())
                .expect("dispatcher");
        let payload = encode_binary_action("recorder", 0, &());
        let (result, action) = dispatcher.parse(&payload);
        assert_eq!(result, ParseResult::WrongMagic);
        assert!(action.is_none());
    }

    #[test]
    fn format_byte_is_required() {
        let dispatcher = dispatcher();
        assert_eq!(
            dispatcher.parse(b"contract-action/recorder-1.0").0,
            ParseResult::ParseFailed
        );
        assert_eq!(
            dispatcher.parse(b"contract-action/recorder-1.0x").0,
            ParseResult::ParseFailed
        );
        assert_eq!(
            dispatcher.parse(b"contract-action/other-1.0b\x00").0,
            ParseResult::WrongMagic
        );
    }

    #[test]
    fn out_of_range_discriminant_fails() {
        let dispatcher = dispatcher();
        let payload = encode_binary_action("recorder", 3, &());
        assert_eq!(dispatcher.parse(&payload).0, ParseResult::ParseFailed);
    }

    #[test]
    fn text_payloads_decode_by_name() {
        let dispatcher = dispatcher();
        let mut recorder = Recorder::default();

        let (result, action) = dispatcher.parse(b"contract-action/recorder-1.0s  third [4, [5, 6]] ");
        assert_eq!(result, ParseResult::ParseOk);
        let action = action.expect("action");
        assert_eq!(action.discriminant(), 2);
        dispatcher.dispatch(&mut recorder, action).expect("dispatch");
        assert_eq!(recorder.calls, vec![("third", vec![4, 5, 6])]);

        let (result, _) = dispatcher.parse(b"contract-action/recorder-1.0sfirst");
        assert_eq!(result, ParseResult::ParseOk);
        let (result, _) = dispatcher.parse(b"contract-action/recorder-1.0sfirst []");
        assert_eq!(result, ParseResult::ExtraData);
    }

    #[test]
    fn text_argument_count_is_checked() {
        let dispatcher = dispatcher();
        let (result, action) = dispatcher.parse(b"contract-action/recorder-1.0ssecond []");
        assert_eq!(result, ParseResult::ParseFailed);
        assert!(action.is_none());

        let (result, action) = dispatcher.parse(b"contract-action/recorder-1.0ssecond [1, 2]");
        assert_eq!(result, ParseResult::ExtraData);
        assert_eq!(
            action.expect("action").arguments().expect("json"),
            vec![serde_json::json!(1)]
        );

        let (result, _) = dispatcher.parse(b"contract-action/recorder-1.0ssecond [1] junk");
        assert_eq!(result, ParseResult::ExtraData);

        let (result, _) = dispatcher.parse(b"contract-action/recorder-1.0ssecond [\"x\"]");
        assert_eq!(result, ParseResult::ParseFailed);

        let (result, _) = dispatcher.parse(b"contract-action/recorder-1.0snosuchaction [1]");
        assert_eq!(result, ParseResult::ParseFailed);
    }

    #[test]
    fn deep_text_arguments_are_rejected() {
        let mut registry = ActionRegistry::<Recorder>::new();
        registry
            .action(Name::new("third"), Recorder::third)
            .expect("third");
        let config = BalConfig::new("recorder").with_max_decode_depth(1);
        let dispatcher = Dispatcher::new(&config, registry).expect("dispatcher");
        let (result, _) =
            dispatcher.parse(b"contract-action/recorder-1.0sthird [1, [[2]]]");
        assert_eq!(result, ParseResult::ParseFailed);
    }
}
