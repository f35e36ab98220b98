use super::walker::{walk, InstructionVisitor, Visit};
use super::{QuickenSlot, QuickenTable, QuickenTableReader};
use crate::dex::{CodeItem, DexPc, FieldAccess, Opcode, VirtualInvoke};

/// Undo quickening of a code item, using the table produced when it was quickened
///
/// Quick field accesses and invocations get their generic opcode and original index back, and
/// elided `check-cast`s are reinstated. `return-void-no-barrier` goes back to `return-void` only
/// when `decompile_return_instruction` is set, since keeping it is harmless for a method that
/// was allowed to have it in the first place.
///
/// `nop`s are only matched against the table when the table is non-empty: code quickened without
/// recording anything (eg. when only `return-void` was touched) has no entries to pair them with.
pub fn dequicken(
    code: &mut CodeItem,
    table: QuickenTable<'_>,
    decompile_return_instruction: bool,
) {
    let mut dequickener = Dequickener {
        code,
        table: table.reader(),
        decompile_return_instruction,
    };
    walk(&mut dequickener);

    let consumed = dequickener.table.consumed();
    if consumed == table.len() {
        return;
    }

    // Seen with code items whose table belongs to a different (identical) method body
    if consumed == 0 {
        log::warn!(
            "Dequickening used none of the {} quicken table entries; leaving the rest of the code as is",
            table.len()
        );
        return;
    }
    panic!(
        "Mismatched number of quicken slots: used {} of {} dequickening",
        consumed,
        table.len()
    );
}

struct Dequickener<'c, 't> {
    code: &'c mut CodeItem,
    table: QuickenTableReader<'t>,
    decompile_return_instruction: bool,
}

impl<'c, 't> Dequickener<'c, 't> {
    fn restore(&mut self, dex_pc: DexPc, generic: Opcode) {
        let index = self.table.next_member_index();
        log::trace!(
            "Restoring {} with index {} at dex pc {:?}",
            generic,
            index,
            dex_pc
        );
        self.code.set_opcode(dex_pc, generic);
        self.code.set_reference_index(dex_pc, index);
    }
}

impl<'c, 't> InstructionVisitor for Dequickener<'c, 't> {
    fn code(&self) -> &CodeItem {
        &*self.code
    }

    fn visit_return_void_no_barrier(&mut self, dex_pc: DexPc) {
        if self.decompile_return_instruction {
            self.code.set_opcode(dex_pc, Opcode::RETURN_VOID);
        }
    }

    fn visit_nop(&mut self, dex_pc: DexPc) -> Visit {
        if self.table.table().is_empty() {
            return Visit::Continue;
        }
        let register = match self.table.next_nop_slot() {
            QuickenSlot::CheckCastHalf(register) => register,
            _ => return Visit::Continue,
        };
        let register = match u8::try_from(register) {
            Ok(register) => register,
            Err(_) => panic!(
                "check-cast register v{} at dex pc {:?} does not fit in 8 bits",
                register, dex_pc
            ),
        };
        let type_index = self.table.next_check_cast_type();
        log::trace!(
            "Restoring {} v{}, type@{} at dex pc {:?}",
            Opcode::CHECK_CAST,
            register,
            type_index,
            dex_pc
        );
        self.code.set_opcode(dex_pc, Opcode::CHECK_CAST);
        self.code.set_vreg_a_21c(dex_pc, register);
        self.code.set_reference_index(dex_pc, type_index);
        Visit::ConsumedNext
    }

    fn visit_field_access(&mut self, dex_pc: DexPc, access: FieldAccess) {
        if self.code.instruction_at(dex_pc).opcode() == access.quick {
            self.restore(dex_pc, access.generic);
        }
    }

    fn visit_virtual_invoke(&mut self, dex_pc: DexPc, invoke: VirtualInvoke) {
        if self.code.instruction_at(dex_pc).opcode() == invoke.quick {
            self.restore(dex_pc, invoke.generic);
        }
    }
}
