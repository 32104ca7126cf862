/// Calls lowered by inline emission instead of `callsub` dispatch.
///
/// Every builtin follows the call convention of leaving exactly one value on
/// the compute stack; the handlers in codegen pad with a dummy `int 0` where
/// the underlying opcode produces nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    AppGlobalPut,
    AppGlobalGet,
    AppGlobalDel,
    AppLocalPut,
    AppLocalGet,
    AppLocalDel,
    Btoi,
    Itob,
    Exit,
    ItxnBegin,
    ItxnField,
    ItxnSubmit,
}

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Self::AppGlobalPut => "appGlobalPut",
            Self::AppGlobalGet => "appGlobalGet",
            Self::AppGlobalDel => "appGlobalDel",
            Self::AppLocalPut => "appLocalPut",
            Self::AppLocalGet => "appLocalGet",
            Self::AppLocalDel => "appLocalDel",
            Self::Btoi => "btoi",
            Self::Itob => "itob",
            Self::Exit => "exit",
            Self::ItxnBegin => "itxn_begin",
            Self::ItxnField => "itxn_field",
            Self::ItxnSubmit => "itxn_submit",
        }
    }

    /// Number of call arguments the builtin consumes.
    pub fn arity(self) -> usize {
        match self {
            Self::AppLocalPut => 3,
            Self::AppGlobalPut | Self::AppLocalGet | Self::AppLocalDel | Self::ItxnField => 2,
            Self::AppGlobalGet | Self::AppGlobalDel | Self::Btoi | Self::Itob | Self::Exit => 1,
            Self::ItxnBegin | Self::ItxnSubmit => 0,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "appGlobalPut" => Some(Self::AppGlobalPut),
            "appGlobalGet" => Some(Self::AppGlobalGet),
            "appGlobalDel" => Some(Self::AppGlobalDel),
            "appLocalPut" => Some(Self::AppLocalPut),
            "appLocalGet" => Some(Self::AppLocalGet),
            "appLocalDel" => Some(Self::AppLocalDel),
            "btoi" => Some(Self::Btoi),
            "itob" => Some(Self::Itob),
            "exit" => Some(Self::Exit),
            "itxn_begin" => Some(Self::ItxnBegin),
            "itxn_field" => Some(Self::ItxnField),
            "itxn_submit" => Some(Self::ItxnSubmit),
            _ => None,
        }
    }
}
