use crate::dex::{CodeItem, DexPc, FieldAccess, Opcode, VirtualInvoke};
use crate::util::Width;

/// What the walker should do after visiting an instruction
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Visit {
    Continue,

    /// The instruction was the first `nop` of an elided `check-cast`: skip the second one too
    ConsumedNext,
}

/// Callbacks for the instructions quickening cares about
///
/// Quickening, replaying a quickening, and dequickening all walk a method the same way and only
/// differ in what they do at each of these instructions. Generic and quick forms of field
/// accesses and invocations go to the same callback.
pub trait InstructionVisitor {
    fn code(&self) -> &CodeItem;

    fn visit_return_void(&mut self, _dex_pc: DexPc) {}

    fn visit_return_void_no_barrier(&mut self, _dex_pc: DexPc) {}

    fn visit_check_cast(&mut self, _dex_pc: DexPc) {}

    fn visit_nop(&mut self, _dex_pc: DexPc) -> Visit {
        Visit::Continue
    }

    fn visit_field_access(&mut self, _dex_pc: DexPc, _access: FieldAccess) {}

    fn visit_virtual_invoke(&mut self, _dex_pc: DexPc, _invoke: VirtualInvoke) {}
}

/// Visit every instruction of the visitor's code item in dex pc order
///
/// Widths are measured before the visitor runs, so a visitor may rewrite the instruction it is
/// given (but never resize it).
pub fn walk<V: InstructionVisitor>(visitor: &mut V) {
    let end = visitor.code().end();
    let mut dex_pc = DexPc::START;
    while dex_pc < end {
        let insn = visitor.code().instruction_at(dex_pc);
        let width = std::cmp::min(insn.width(), end.index() - dex_pc.index());
        let opcode = insn.opcode();

        let visit = match opcode {
            Opcode::NOP => visitor.visit_nop(dex_pc),
            Opcode::RETURN_VOID => {
                visitor.visit_return_void(dex_pc);
                Visit::Continue
            }
            Opcode::RETURN_VOID_NO_BARRIER => {
                visitor.visit_return_void_no_barrier(dex_pc);
                Visit::Continue
            }
            Opcode::CHECK_CAST => {
                visitor.visit_check_cast(dex_pc);
                Visit::Continue
            }
            _ => {
                if let Some(access) = opcode.field_access() {
                    visitor.visit_field_access(dex_pc, access);
                } else if let Some(invoke) = opcode.virtual_invoke() {
                    visitor.visit_virtual_invoke(dex_pc, invoke);
                }
                Visit::Continue
            }
        };

        dex_pc = dex_pc.advance(width);
        if visit == Visit::ConsumedNext {
            assert!(
                dex_pc < end,
                "elided check-cast at {:?} has no second nop",
                dex_pc
            );
            dex_pc = dex_pc.advance(Opcode::NOP.format().width());
        }
    }
}
