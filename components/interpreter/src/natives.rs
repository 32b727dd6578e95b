//! Native library
//!
//! A native finds `[args][argc]` on the stack. It checks the count, releases
//! the handles it consumes and leaves its result where the first argument
//! was. The table order is the call index the compiler bakes into
//! `CALL_NATIVE`, so [`native_signatures`] and [`native_functions`] must stay
//! in step.

use std::io::Write;

use bytecode_system::{NativeSignature, Word};
use memory_manager::{Blob, HeapObject};
use rand::Rng;

use crate::error::{MachineError, MachineErrorKind, MachineResult};
use crate::vm::{real_to_word, word_to_real, StackMachine};

/// Host function called by `CALL_NATIVE`
pub type NativeFunction = fn(&mut StackMachine) -> MachineResult<()>;

/// Trap raised by `get_char`, answered with a byte or -1 at end of input
pub const GET_CHAR_TRAP: &str = "@get_char";

fn library() -> Vec<(NativeSignature, NativeFunction)> {
    use NativeSignature as Sig;
    vec![
        (Sig::function("get_char", &[], "char"), get_char),
        (Sig::procedure("write", &["text"]), write),
        (Sig::procedure("print", &["text"]), print),
        (Sig::function("print", &["text"], "text"), print_through),
        (Sig::function("text", &["integer"], "text"), integer_to_text),
        (Sig::function("text", &["real"], "text"), real_to_text),
        (Sig::function("text", &["char"], "text"), char_to_text),
        (Sig::function("text", &["boolean"], "text"), boolean_to_text),
        (Sig::function("length", &["text"], "integer"), length),
        (Sig::function("text", &["[char]"], "text"), chars_to_text),
        (Sig::function("text", &["[integer]"], "text"), integers_to_text),
        (Sig::function("text", &["[boolean]"], "text"), booleans_to_text),
        (Sig::function("text", &["[text]"], "text"), texts_to_text),
        (Sig::function("concat", &["text", "text"], "text"), concat),
        (Sig::function("subtext", &["text", "integer", "integer"], "text"), subtext),
        (Sig::function("subtext", &["text", "integer"], "text"), subtext_to_end),
        (Sig::function("trim", &["text"], "text"), trim),
        (Sig::function("char_code", &["text", "integer"], "integer"), char_code),
        (Sig::function("char_at", &["text", "integer"], "char"), char_code),
        (Sig::function("index_of", &["char", "text"], "integer"), index_of_char),
        (Sig::function("index_of", &["text", "text"], "integer"), index_of_text),
        (Sig::function("split", &["text", "text"], "[text]"), split),
        (Sig::function("abs", &["integer"], "integer"), abs),
        (Sig::function("real", &["integer"], "real"), integer_to_real),
        (Sig::function("sqrt", &["real"], "real"), sqrt),
        (Sig::function("log", &["real"], "real"), log),
        (Sig::function("now", &[], "integer"), now),
        (Sig::function("random", &["integer", "integer"], "integer"), random),
        (Sig::function("integer", &["text"], "integer"), text_to_integer),
        (Sig::function("ceil", &["real"], "integer"), ceil),
        (Sig::function("floor", &["real"], "integer"), floor),
    ]
}

/// Declarations to register with the compiler
///
/// # Examples
///
/// ```
/// use interpreter::native_signatures;
///
/// let natives = native_signatures();
/// assert_eq!(natives[0].name, "get_char");
/// assert!(natives.iter().any(|n| n.name == "print" && n.is_procedure()));
/// ```
pub fn native_signatures() -> Vec<NativeSignature> {
    library().into_iter().map(|(signature, _)| signature).collect()
}

/// Host functions, index for index with [`native_signatures`]
pub fn native_functions() -> Vec<NativeFunction> {
    library().into_iter().map(|(_, function)| function).collect()
}

fn out_of_bound() -> MachineError {
    MachineErrorKind::RefAccessOutOfBound.into()
}

impl StackMachine {
    /// Slot of the first argument, once the pushed count matches
    fn native_args(&self, expected: usize) -> MachineResult<usize> {
        let top = self
            .sp()
            .checked_sub(1)
            .ok_or(MachineErrorKind::StackAccessOutOfBound)?;
        if self.stack[top] != expected as Word {
            return Err(MachineErrorKind::NativeArgCountMismatch.into());
        }
        top.checked_sub(expected)
            .ok_or_else(|| MachineErrorKind::StackAccessOutOfBound.into())
    }

    fn native_return(&mut self, base: usize, value: Word, is_ref: bool) -> MachineResult<()> {
        self.truncate(base);
        self.push(value, is_ref)
    }

    fn text_arg(&self, slot: usize) -> MachineResult<String> {
        if !self.stack_map[slot] {
            return Err(MachineErrorKind::InvalidRefType.into());
        }
        Ok(self.ref_man.get_string(self.stack[slot])?.to_string())
    }

    fn blob_arg(&self, slot: usize) -> MachineResult<Blob> {
        if !self.stack_map[slot] {
            return Err(MachineErrorKind::InvalidRefType.into());
        }
        Ok(self.ref_man.get_blob(self.stack[slot])?.clone())
    }

    /// Release the handles of the argument slots from `base` up
    fn release_args(&mut self, base: usize) -> MachineResult<()> {
        let top = self.sp().saturating_sub(1);
        for slot in base..top {
            self.release(self.stack[slot], self.stack_map[slot])?;
        }
        Ok(())
    }

    fn return_text(&mut self, base: usize, text: String) -> MachineResult<()> {
        let handle = self.ref_man.add_ref(HeapObject::String(text));
        self.native_return(base, handle, true)
    }

    fn emit_text(&mut self, text: &str, newline: bool) -> MachineResult<()> {
        let written = if newline {
            writeln!(self.out, "{}", text)
        } else {
            write!(self.out, "{}", text)
        };
        written.map_err(|err| MachineErrorKind::Output(err.to_string()).into())
    }
}

/// Pure text function of one text argument
fn map_text(machine: &mut StackMachine, f: impl FnOnce(&str) -> MachineResult<Word>) -> MachineResult<()> {
    let base = machine.native_args(1)?;
    let text = machine.text_arg(base)?;
    let value = f(&text)?;
    machine.release_args(base)?;
    machine.native_return(base, value, false)
}

/// Text rendering of one scalar argument
fn scalar_to_text(machine: &mut StackMachine, f: impl FnOnce(Word) -> String) -> MachineResult<()> {
    let base = machine.native_args(1)?;
    let text = f(machine.stack[base]);
    machine.return_text(base, text)
}

/// Text rendering of an array of scalars
fn array_to_text(machine: &mut StackMachine, f: impl FnOnce(&[Word]) -> String) -> MachineResult<()> {
    let base = machine.native_args(1)?;
    let blob = machine.blob_arg(base)?;
    let text = f(&blob.slots);
    machine.release_args(base)?;
    machine.return_text(base, text)
}

fn unary_integer(machine: &mut StackMachine, f: impl FnOnce(Word) -> Word) -> MachineResult<()> {
    let base = machine.native_args(1)?;
    let value = f(machine.stack[base]);
    machine.native_return(base, value, false)
}

fn code_to_char(code: Word) -> char {
    u32::try_from(code)
        .ok()
        .and_then(char::from_u32)
        .unwrap_or(char::REPLACEMENT_CHARACTER)
}

fn boolean_text(value: Word) -> &'static str {
    if value != 0 {
        "true"
    } else {
        "false"
    }
}

fn get_char(machine: &mut StackMachine) -> MachineResult<()> {
    machine.native_args(0)?;
    Err(MachineError::trap(GET_CHAR_TRAP))
}

fn write(machine: &mut StackMachine) -> MachineResult<()> {
    let base = machine.native_args(1)?;
    let text = machine.text_arg(base)?;
    machine.emit_text(&text, false)?;
    machine.release_args(base)?;
    machine.truncate(base);
    Ok(())
}

fn print(machine: &mut StackMachine) -> MachineResult<()> {
    let base = machine.native_args(1)?;
    let text = machine.text_arg(base)?;
    machine.emit_text(&text, true)?;
    machine.release_args(base)?;
    machine.truncate(base);
    Ok(())
}

fn print_through(machine: &mut StackMachine) -> MachineResult<()> {
    let base = machine.native_args(1)?;
    let text = machine.text_arg(base)?;
    machine.emit_text(&text, true)?;
    machine.truncate(base + 1);
    Ok(())
}

fn integer_to_text(machine: &mut StackMachine) -> MachineResult<()> {
    scalar_to_text(machine, |value| value.to_string())
}

fn real_to_text(machine: &mut StackMachine) -> MachineResult<()> {
    scalar_to_text(machine, |value| word_to_real(value).to_string())
}

fn char_to_text(machine: &mut StackMachine) -> MachineResult<()> {
    scalar_to_text(machine, |value| code_to_char(value).to_string())
}

fn boolean_to_text(machine: &mut StackMachine) -> MachineResult<()> {
    scalar_to_text(machine, |value| boolean_text(value).to_string())
}

fn length(machine: &mut StackMachine) -> MachineResult<()> {
    map_text(machine, |text| Ok(text.chars().count() as Word))
}

fn chars_to_text(machine: &mut StackMachine) -> MachineResult<()> {
    array_to_text(machine, |slots| slots.iter().map(|code| code_to_char(*code)).collect())
}

fn integers_to_text(machine: &mut StackMachine) -> MachineResult<()> {
    array_to_text(machine, |slots| {
        let items: Vec<String> = slots.iter().map(Word::to_string).collect();
        format!("[{}]", items.join(","))
    })
}

fn booleans_to_text(machine: &mut StackMachine) -> MachineResult<()> {
    array_to_text(machine, |slots| {
        let items: Vec<&str> = slots.iter().map(|value| boolean_text(*value)).collect();
        format!("[{}]", items.join(","))
    })
}

fn texts_to_text(machine: &mut StackMachine) -> MachineResult<()> {
    let base = machine.native_args(1)?;
    let blob = machine.blob_arg(base)?;
    let items = blob
        .refs()
        .map(|handle| machine.ref_man.get_string(handle).map(str::to_string))
        .collect::<Result<Vec<_>, _>>()?;
    machine.release_args(base)?;
    machine.return_text(base, format!("[{}]", items.join(", ")))
}

fn concat(machine: &mut StackMachine) -> MachineResult<()> {
    let base = machine.native_args(2)?;
    let right = machine.text_arg(base + 1)?;
    let left = machine.stack[base];
    if machine.stack_map[base] && machine.ref_man.ref_count(left)? == 1 {
        machine.ref_man.get_string_mut(left)?.push_str(&right);
        machine.release(machine.stack[base + 1], machine.stack_map[base + 1])?;
        return machine.native_return(base, left, true);
    }
    let mut text = machine.text_arg(base)?;
    text.push_str(&right);
    machine.release_args(base)?;
    machine.return_text(base, text)
}

/// `count` chars of `text` from `begin`, which must fit
fn char_range(text: &str, begin: Word, count: Word) -> MachineResult<String> {
    let total = text.chars().count() as Word;
    let count = count.max(0);
    if begin < 0 || begin + count > total {
        return Err(out_of_bound());
    }
    Ok(text.chars().skip(begin as usize).take(count as usize).collect())
}

fn subtext(machine: &mut StackMachine) -> MachineResult<()> {
    let base = machine.native_args(3)?;
    let text = machine.text_arg(base)?;
    let part = char_range(&text, machine.stack[base + 1], machine.stack[base + 2])?;
    machine.release_args(base)?;
    machine.return_text(base, part)
}

fn subtext_to_end(machine: &mut StackMachine) -> MachineResult<()> {
    let base = machine.native_args(2)?;
    let text = machine.text_arg(base)?;
    let begin = machine.stack[base + 1];
    let rest = (text.chars().count() as Word).saturating_sub(begin.max(0));
    let part = char_range(&text, begin, rest)?;
    machine.release_args(base)?;
    machine.return_text(base, part)
}

fn trim(machine: &mut StackMachine) -> MachineResult<()> {
    let base = machine.native_args(1)?;
    let text = machine.text_arg(base)?;
    machine.release_args(base)?;
    machine.return_text(base, text.trim().to_string())
}

fn char_code(machine: &mut StackMachine) -> MachineResult<()> {
    let base = machine.native_args(2)?;
    let text = machine.text_arg(base)?;
    let code = usize::try_from(machine.stack[base + 1])
        .ok()
        .and_then(|index| text.chars().nth(index))
        .map(|c| c as Word)
        .ok_or_else(out_of_bound)?;
    machine.release_args(base)?;
    machine.native_return(base, code, false)
}

fn index_of_char(machine: &mut StackMachine) -> MachineResult<()> {
    let base = machine.native_args(2)?;
    let needle = code_to_char(machine.stack[base]);
    let text = machine.text_arg(base + 1)?;
    let index = text
        .chars()
        .position(|c| c == needle)
        .map_or(-1, |index| index as Word);
    machine.release_args(base)?;
    machine.native_return(base, index, false)
}

fn index_of_text(machine: &mut StackMachine) -> MachineResult<()> {
    let base = machine.native_args(2)?;
    let needle = machine.text_arg(base)?;
    let text = machine.text_arg(base + 1)?;
    let index = text
        .find(&needle)
        .map_or(-1, |byte| text[..byte].chars().count() as Word);
    machine.release_args(base)?;
    machine.native_return(base, index, false)
}

fn split(machine: &mut StackMachine) -> MachineResult<()> {
    let base = machine.native_args(2)?;
    let text = machine.text_arg(base)?;
    let separator = machine.text_arg(base + 1)?;
    let parts: Vec<String> = if separator.is_empty() {
        text.chars().map(String::from).collect()
    } else {
        text.split(separator.as_str()).map(str::to_string).collect()
    };
    machine.release_args(base)?;
    let slots: Vec<Word> = parts
        .into_iter()
        .map(|part| machine.ref_man.add_ref(HeapObject::String(part)))
        .collect();
    let map = vec![true; slots.len()];
    let array = machine.ref_man.add_ref(HeapObject::Blob(Blob::new(slots, map)));
    machine.native_return(base, array, true)
}

fn abs(machine: &mut StackMachine) -> MachineResult<()> {
    unary_integer(machine, Word::wrapping_abs)
}

fn integer_to_real(machine: &mut StackMachine) -> MachineResult<()> {
    unary_integer(machine, |value| real_to_word(value as f64))
}

fn sqrt(machine: &mut StackMachine) -> MachineResult<()> {
    unary_integer(machine, |value| real_to_word(word_to_real(value).sqrt()))
}

fn log(machine: &mut StackMachine) -> MachineResult<()> {
    unary_integer(machine, |value| real_to_word(word_to_real(value).ln()))
}

fn ceil(machine: &mut StackMachine) -> MachineResult<()> {
    unary_integer(machine, |value| word_to_real(value).ceil() as Word)
}

fn floor(machine: &mut StackMachine) -> MachineResult<()> {
    unary_integer(machine, |value| word_to_real(value).floor() as Word)
}

fn now(machine: &mut StackMachine) -> MachineResult<()> {
    let base = machine.native_args(0)?;
    machine.native_return(base, chrono::Utc::now().timestamp_millis(), false)
}

fn random(machine: &mut StackMachine) -> MachineResult<()> {
    let base = machine.native_args(2)?;
    let (low, high) = (machine.stack[base], machine.stack[base + 1]);
    let value = if high < low {
        low
    } else {
        rand::rng().random_range(low..=high)
    };
    machine.native_return(base, value, false)
}

/// Leading optionally signed decimal integer, 0 when there is none
fn parse_integer_prefix(text: &str) -> Word {
    let text = text.trim_start();
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, text.strip_prefix('+').unwrap_or(text)),
    };
    digits
        .chars()
        .map_while(|c| c.to_digit(10))
        .fold(0 as Word, |acc, digit| {
            acc.wrapping_mul(10).wrapping_add(Word::from(digit))
        })
        .wrapping_mul(sign)
}

fn text_to_integer(machine: &mut StackMachine) -> MachineResult<()> {
    map_text(machine, |text| Ok(parse_integer_prefix(text)))
}
