use crate::codec::{BinaryDecode, BinaryEncode, BinaryReader};
use crate::error::BalError;
use crate::name::Name;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

/// A type usable as an action parameter in both envelope formats.
pub trait ActionParam: BinaryEncode + BinaryDecode + Serialize + DeserializeOwned + 'static {}

impl<T> ActionParam for T where T: BinaryEncode + BinaryDecode + Serialize + DeserializeOwned + 'static {}

/// The ordered parameter list of an action, as a tuple.
pub trait ActionArgs: Sized + 'static {
    const PARAM_COUNT: usize;

    fn decode_binary(reader: &mut BinaryReader<'_>, depth: usize) -> Result<Self, BalError>;

    /// `args` holds at least `PARAM_COUNT` values; extra ones are ignored.
    fn from_json(args: &[Value]) -> Result<Self, BalError>;

    fn encode_binary(&self, out: &mut Vec<u8>);

    fn to_json(&self) -> Result<Vec<Value>, BalError>;
}

fn json_arg<T: DeserializeOwned>(args: &[Value], index: usize) -> Result<T, BalError> {
    let value = args
        .get(index)
        .ok_or_else(|| BalError::Decode(format!("missing argument {index}")))?;
    serde_json::from_value(value.clone())
        .map_err(|e| BalError::Decode(format!("argument {index}: {e}")))
}

fn json_value<T: Serialize>(arg: &T, index: usize) -> Result<Value, BalError> {
    serde_json::to_value(arg).map_err(|e| BalError::Encode(format!("argument {index}: {e}")))
}

macro_rules! tuple_args {
    ($count:expr; $($ty:ident : $idx:tt),*) => {
        impl<$($ty: ActionParam),*> ActionArgs for ($($ty,)*) {
            const PARAM_COUNT: usize = $count;

            #[allow(unused_variables)]
            fn decode_binary(reader: &mut BinaryReader<'_>, depth: usize) -> Result<Self, BalError> {
                Ok(($(<$ty as BinaryDecode>::decode(reader, depth)?,)*))
            }

            #[allow(unused_variables)]
            fn from_json(args: &[Value]) -> Result<Self, BalError> {
                Ok(($(json_arg::<$ty>(args, $idx)?,)*))
            }

            #[allow(unused_variables)]
            fn encode_binary(&self, out: &mut Vec<u8>) {
                $(self.$idx.encode(out);)*
            }

            fn to_json(&self) -> Result<Vec<Value>, BalError> {
                Ok(vec![$(json_value(&self.$idx, $idx)?),*])
            }
        }
    };
}

tuple_args!(0;);
tuple_args!(1; A1: 0);
tuple_args!(2; A1: 0, A2: 1);
tuple_args!(3; A1: 0, A2: 1, A3: 2);
tuple_args!(4; A1: 0, A2: 1, A3: 2, A4: 3);
tuple_args!(5; A1: 0, A2: 1, A3: 2, A4: 3, A5: 4);
tuple_args!(6; A1: 0, A2: 1, A3: 2, A4: 3, A5: 4, A6: 5);

/// A contract method taking its arguments spread out: `fn(&mut C, A1, A2, ..)`.
pub trait Handler<C, A>: 'static {
    fn call(&self, contract: &mut C, args: A) -> Result<(), BalError>;
}

macro_rules! fn_handler {
    ($($ty:ident),*) => {
        impl<C, F, $($ty),*> Handler<C, ($($ty,)*)> for F
        where
            F: Fn(&mut C, $($ty),*) -> Result<(), BalError> + 'static,
        {
            #[allow(non_snake_case)]
            fn call(&self, contract: &mut C, ($($ty,)*): ($($ty,)*)) -> Result<(), BalError> {
                self(contract, $($ty),*)
            }
        }
    };
}

fn_handler!();
fn_handler!(A1);
fn_handler!(A1, A2);
fn_handler!(A1, A2, A3);
fn_handler!(A1, A2, A3, A4);
fn_handler!(A1, A2, A3, A4, A5);
fn_handler!(A1, A2, A3, A4, A5, A6);

/// Arguments already bound to the handler they were parsed for.
pub(crate) trait BoundCall<C> {
    fn arguments(&self) -> Result<Vec<Value>, BalError>;

    fn invoke(self: Box<Self>, contract: &mut C) -> Result<(), BalError>;
}

struct BoundAction<C, A, H> {
    handler: Rc<H>,
    args: A,
    _contract: PhantomData<fn(&mut C)>,
}

impl<C, A, H> BoundCall<C> for BoundAction<C, A, H>
where
    A: ActionArgs,
    H: Handler<C, A>,
{
    fn arguments(&self) -> Result<Vec<Value>, BalError> {
        self.args.to_json()
    }

    fn invoke(self: Box<Self>, contract: &mut C) -> Result<(), BalError> {
        let BoundAction { handler, args, .. } = *self;
        handler.call(contract, args)
    }
}

/// Parses the arguments of one registered action.
pub(crate) trait ActionParser<C> {
    fn param_count(&self) -> usize;

    fn parse_binary(
        &self,
        reader: &mut BinaryReader<'_>,
        depth: usize,
    ) -> Result<Box<dyn BoundCall<C>>, BalError>;

    fn parse_json(&self, args: &[Value]) -> Result<Box<dyn BoundCall<C>>, BalError>;
}

struct TypedAction<C, A, H> {
    handler: Rc<H>,
    _signature: PhantomData<fn(&mut C, A)>,
}

impl<C: 'static, A, H> TypedAction<C, A, H>
where
    A: ActionArgs,
    H: Handler<C, A>,
{
    fn bind(&self, args: A) -> Box<dyn BoundCall<C>> {
        Box::new(BoundAction {
            handler: Rc::clone(&self.handler),
            args,
            _contract: PhantomData,
        })
    }
}

impl<C: 'static, A, H> ActionParser<C> for TypedAction<C, A, H>
where
    A: ActionArgs,
    H: Handler<C, A>,
{
    fn param_count(&self) -> usize {
        A::PARAM_COUNT
    }

    fn parse_binary(
        &self,
        reader: &mut BinaryReader<'_>,
        depth: usize,
    ) -> Result<Box<dyn BoundCall<C>>, BalError> {
        A::decode_binary(reader, depth).map(|args| self.bind(args))
    }

    fn parse_json(&self, args: &[Value]) -> Result<Box<dyn BoundCall<C>>, BalError> {
        A::from_json(args).map(|args| self.bind(args))
    }
}

pub(crate) struct ActionEntry<C> {
    pub(crate) name: Name,
    pub(crate) parser: Rc<dyn ActionParser<C>>,
}

/// Actions of a contract in declaration order; the position is the binary
/// discriminant.
pub struct ActionRegistry<C> {
    pub(crate) actions: Vec<ActionEntry<C>>,
    names: HashSet<Name>,
}

impl<C> Default for ActionRegistry<C> {
    fn default() -> Self {
        Self {
            actions: Vec::new(),
            names: HashSet::new(),
        }
    }
}

impl<C> fmt::Debug for ActionRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.actions.iter().map(|a| a.name.to_string()))
            .finish()
    }
}

impl<C: 'static> ActionRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn action<A, H>(&mut self, name: Name, handler: H) -> Result<&mut Self, BalError>
    where
        A: ActionArgs,
        H: Handler<C, A>,
    {
        if name.is_empty() {
            return Err(BalError::Schema("action name must not be empty".into()));
        }
        if !self.names.insert(name) {
            return Err(BalError::Schema(format!(
                "action {name} registered more than once"
            )));
        }
        self.actions.push(ActionEntry {
            name,
            parser: Rc::new(TypedAction::<C, A, H> {
                handler: Rc::new(handler),
                _signature: PhantomData,
            }),
        });
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = Name> + '_ {
        self.actions.iter().map(|a| a.name)
    }

    pub fn discriminant(&self, name: Name) -> Option<usize> {
        self.actions.iter().position(|a| a.name == name)
    }
}

/// A decoded action, ready to run exactly once.
pub struct ParsedAction<C> {
    pub(crate) discriminant: usize,
    pub(crate) name: Name,
    pub(crate) call: Box<dyn BoundCall<C>>,
}

impl<C> ParsedAction<C> {
    pub fn discriminant(&self) -> usize {
        self.discriminant
    }

    pub fn name(&self) -> Name {
        self.name
    }

    pub fn arguments(&self) -> Result<Vec<Value>, BalError> {
        self.call.arguments()
    }
}

impl<C> fmt::Debug for ParsedAction<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParsedAction")
            .field("discriminant", &self.discriminant)
            .field("name", &self.name.to_string())
            .field("arguments", &self.arguments())
            .finish()
    }
}
