//! Human-readable listings of code blocks

use crate::code_block::CodeBlock;
use crate::opcode::{LangOp, NoArgOp, Opcode};

/// Render one instruction per line, marking `ip` with `> `
///
/// # Examples
///
/// ```
/// use bytecode_system::{disassemble, CodeBlock, LangOp};
///
/// let mut block = CodeBlock::new("global");
/// block.emit_push(0);
/// block.emit_ext(LangOp::CreateString);
/// let listing = disassemble(&block, None);
/// assert!(listing.contains("CREATE_STRING"));
/// ```
pub fn disassemble(block: &CodeBlock, ip: Option<usize>) -> String {
    let mut out = String::new();
    let mut i = 0;
    while i + 1 < block.codes.len() {
        let opcode = block.codes[i];
        let arg = block.codes[i + 1];
        let marker = if ip == Some(i) { "> " } else { "" };
        let prefix = format!("{:>10}", format!("{}{}: ", marker, i));
        let text = match Opcode::from_code(opcode) {
            Some(Opcode::NoArg) => NoArgOp::from_code(arg)
                .map(|op| op.name().to_string())
                .unwrap_or_else(|| format!("NOARG {}", arg)),
            Some(Opcode::Ext) => LangOp::from_code(arg)
                .map(|op| op.name().to_string())
                .unwrap_or_else(|| format!("EXT {}", arg)),
            Some(op) => format!("{:<26}{}", op.name(), arg),
            None => format!("?{:<25}{}", opcode, arg),
        };
        out.push_str(&prefix);
        out.push_str(&text);
        out.push('\n');
        i += 2;
    }
    out
}
