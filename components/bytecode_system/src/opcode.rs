//! Opcodes of the stack machine.
//!
//! Every instruction is two words: an [`Opcode`] and its operand. Operations
//! that need no operand are encoded as `NOARG <op>` with a [`NoArgOp`], and
//! the language-level heap operations as `EXT <op>` with a [`LangOp`].

/// One word of code or stack.
pub type Word = i64;

macro_rules! word_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $code:literal => $text:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
        }

        impl $name {
            /// All variants in code order
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            /// Encoded word of this opcode
            pub fn code(self) -> Word {
                match self {
                    $($name::$variant => $code,)+
                }
            }

            /// Decode a word, `None` when it names no opcode
            pub fn from_code(code: Word) -> Option<Self> {
                match code {
                    $($code => Some($name::$variant),)+
                    _ => None,
                }
            }

            /// Mnemonic used in listings
            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }
    };
}

word_enum! {
    /// Two-word instruction opcodes
    pub enum Opcode {
        /// Run the [`NoArgOp`] given as operand
        NoArg = 1 => "NOARG",
        /// Pop, jump when zero
        Jz = 2 => "JZ",
        /// Pop, jump when non-zero
        Jnz = 3 => "JNZ",
        /// Unconditional jump
        Jmp = 4 => "JMP",
        /// Push an immediate
        Push = 5 => "PUSH",
        /// Push a copy of an absolute slot
        PushGlobal = 6 => "PUSH_GLOBAL",
        /// Move an absolute slot to the top, clearing the source
        PushGlobalMove = 7 => "PUSH_GLOBAL_MOVE",
        /// Make an absolute slot uniquely owned, then push a copy
        PushGlobalForMutate = 8 => "PUSH_GLOBAL_FOR_MUTATE",
        /// Push a copy of a slot relative to the base pointer
        PushLocal = 9 => "PUSH_LOCAL",
        /// Move a relative slot to the top, clearing the source
        PushLocalMove = 10 => "PUSH_LOCAL_MOVE",
        /// Make a relative slot uniquely owned, then push a copy
        PushLocalForMutate = 11 => "PUSH_LOCAL_FOR_MUTATE",
        /// Pop into an absolute slot
        PopGlobal = 12 => "POP_GLOBAL",
        /// Pop into a relative slot
        PopLocal = 13 => "POP_LOCAL",
        /// Drop the given number of slots
        PopVoid = 14 => "POP_VOID",
        /// Call a code block
        Call = 15 => "CALL",
        /// Call a host function by index
        CallNative = 16 => "CALL_NATIVE",
        /// Push a float constant by pool index
        PushF = 17 => "PUSHF",
        /// Compare two values of the given slot count
        Eq = 18 => "EQ",
        /// Return the given number of result slots
        Ret = 19 => "RET",
        /// Duplicate the given number of top slots
        Dup = 20 => "DUP",
        /// Reverse the given number of top slots
        Swap = 21 => "SWAP",
        /// Run the [`LangOp`] given as operand
        Ext = 22 => "EXT",
    }
}

word_enum! {
    /// Operations encoded as `NOARG <op>`
    pub enum NoArgOp {
        /// Stop the run loop with a suspension
        Suspend = 1 => "SUSPEND",
        /// Integer addition
        Add = 2 => "ADD",
        /// Real addition
        AddF = 3 => "ADDF",
        /// Integer subtraction
        Sub = 4 => "SUB",
        /// Real subtraction
        SubF = 5 => "SUBF",
        /// Integer division, truncating
        Div = 6 => "DIV",
        /// Real division
        DivF = 7 => "DIVF",
        /// Integer remainder
        Rem = 8 => "REM",
        /// Integer multiplication
        Mul = 9 => "MUL",
        /// Real multiplication
        MulF = 10 => "MULF",
        /// Integer negation
        Neg = 11 => "NEG",
        /// Real negation
        NegF = 12 => "NEGF",
        /// Integer greater than
        Gt = 13 => "GT",
        /// Real greater than
        GtF = 14 => "GTF",
        /// Integer less than
        Lt = 15 => "LT",
        /// Real less than
        LtF = 16 => "LTF",
        /// Integer greater or equal
        Gte = 17 => "GTE",
        /// Real greater or equal
        GteF = 18 => "GTEF",
        /// Integer less or equal
        Lte = 19 => "LTE",
        /// Real less or equal
        LteF = 20 => "LTEF",
        /// Boolean and
        And = 21 => "AND",
        /// Boolean or
        Or = 22 => "OR",
        /// Boolean not
        Not = 23 => "NOT",
    }
}

word_enum! {
    /// Language operations encoded as `EXT <op>`
    pub enum LangOp {
        /// Allocate a string from the block's string pool
        CreateString = 0 => "CREATE_STRING",
        /// Concatenate n strings
        ConcatString = 1 => "CONCAT_STRING",
        /// Allocate a blob from n stack slots
        CreateBlob = 2 => "CREATE_BLOB",
        /// Copy a slot range of a blob to the stack
        ReadBlob = 3 => "READ_BLOB",
        /// Overwrite a slot range of a blob
        WriteBlob = 4 => "WRITE_BLOB",
        /// Concatenate n blobs
        ConcatBlob = 5 => "CONCAT_BLOB",
        /// Make a nested reference uniquely owned and push it
        GetBlobMutableOffset = 6 => "GET_BLOB_MUTABLE_OFFSET",
        /// Slot count of a blob
        GetBlobSize = 7 => "GET_BLOB_SIZE",
        /// Index of an item in a blob, or -1
        GetBlobIndexOfItem = 8 => "GET_BLOB_INDEX_OF_ITEM",
        /// Copy a slot range into a new blob
        SliceBlob = 9 => "SLICE_BLOB",
        /// Allocate a blob repeating one item n times
        CreateBlobRepeatItem = 10 => "CREATE_BLOB_REPEAT_ITEM",
        /// Reify an exception handler for the current frame
        CreateExceptionHandler = 11 => "CREATE_EXCEPTION_HANDLER",
        /// Unwind to the nearest exception handler
        RaiseException = 12 => "RAISE_EXCEPTION",
        /// Package a not yet started generator frame
        CreateGenerator = 13 => "CREATE_GENERATOR",
        /// Resume a generator until its next yield
        GetGeneratorNextItem = 14 => "GET_GENERATOR_NEXT_ITEM",
        /// Whether a generator ran past its last instruction
        HasGeneratorEnded = 15 => "HAS_GENERATOR_ENDED",
        /// Suspend the running generator with an item
        YieldGeneratorItem = 16 => "YIELD_GENERATOR_ITEM",
    }
}
