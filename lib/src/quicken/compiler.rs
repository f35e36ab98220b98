//! Forward quickening
//!
//! Quickening rewrites, in place:
//!
//!   - `return-void` into `return-void-no-barrier`, unless the method is an instance constructor
//!     whose class needs a constructor barrier (not recorded: the opcode alone says it all)
//!   - `check-cast` into two `nop`s, when verification proved the cast always succeeds
//!   - `iget*`/`iput*` into `iget*-quick`/`iput*-quick`, with the field index replaced by the
//!     field's byte offset
//!   - `invoke-virtual{,/range}` into `invoke-virtual{,/range}-quick`, with the method index
//!     replaced by the vtable index
//!
//! Each rewrite records the operand it overwrote so that `dequicken` can undo it. Bare `nop`s
//! get a `NoIndex` record so that they can be told apart from elided `check-cast`s.
//!
//! Failing to resolve something is never an error: the instruction just stays as it is.

use super::walker::{walk, InstructionVisitor, Visit};
use super::{
    needs_index, QuickenRecord, QuickenSlot, QuickenTable, QuickenTableBuilder,
    QuickenTableReader, Settings,
};
use crate::dex::{
    CodeItem, DexFileId, DexPc, FieldAccess, MethodAccessFlags, MethodReference, Opcode,
    VirtualInvoke,
};

/// Field layout, as seen by the method being compiled
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct ResolvedField {
    /// Byte offset of the field inside instances of its class
    pub offset: u32,
    pub is_volatile: bool,
}

/// Answers quickening needs from class linking and verification
///
/// A failed resolution is reported as `None`/`false`; implementations are expected to clear any
/// pending error they raised along the way before returning.
pub trait Resolver {
    /// Does the class need a barrier at the end of its instance constructors (eg. because it has
    /// `final` fields)?
    fn requires_constructor_barrier(&self, dex_file: DexFileId, class_def_index: u16) -> bool;

    /// Did verification prove that the `check-cast` at this dex pc in this method always succeeds?
    fn is_safe_cast(&self, method: MethodReference, dex_pc: DexPc) -> bool;

    fn resolve_instance_field(
        &self,
        method: MethodReference,
        field_index: u16,
        is_put: bool,
    ) -> Option<ResolvedField>;

    /// Vtable index of a virtual method
    fn resolve_virtual_method(&self, method: MethodReference, method_index: u16) -> Option<u32>;
}

/// Everything needed to quicken one method
pub struct CompilationUnit<'a, R: ?Sized> {
    pub method: MethodReference,
    pub class_def_index: u16,
    pub access_flags: MethodAccessFlags,
    pub resolver: &'a R,
    pub settings: &'a Settings,
}

impl<'a, R: Resolver + ?Sized> CompilationUnit<'a, R> {
    /// Must `return-void` keep its barrier?
    pub fn requires_constructor_barrier(&self) -> bool {
        self.access_flags.is_instance_constructor()
            && self
                .resolver
                .requires_constructor_barrier(self.method.dex_file, self.class_def_index)
    }

    /// Would `check-cast` at this dex pc be elided?
    fn elides_check_cast(&self, dex_pc: DexPc) -> bool {
        self.settings.enable_check_cast_elision
            && self.resolver.is_safe_cast(self.method, dex_pc)
    }

    /// Field offset that can stand in for this field index, if any
    fn quick_field_offset(&self, field_index: u16, is_put: bool) -> Option<u16> {
        if !self.settings.enable_quickening {
            return None;
        }
        let field = self
            .resolver
            .resolve_instance_field(self.method, field_index, is_put)?;
        if field.is_volatile {
            return None;
        }
        u16::try_from(field.offset).ok()
    }

    /// Vtable index that can stand in for this method index, if any
    fn quick_vtable_index(&self, method_index: u16) -> Option<u16> {
        if !self.settings.enable_quickening {
            return None;
        }
        let vtable_index = self
            .resolver
            .resolve_virtual_method(self.method, method_index)?;
        u16::try_from(vtable_index).ok()
    }
}

/// Result of quickening (or replaying the quickening of) a method
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct QuickenOutcome {
    /// Records in dex pc order
    pub records: Vec<QuickenRecord>,

    /// Was some `return-void` rewritten into `return-void-no-barrier`?
    pub optimized_return_void: bool,
}

impl QuickenOutcome {
    fn new() -> QuickenOutcome {
        QuickenOutcome {
            records: vec![],
            optimized_return_void: false,
        }
    }

    fn record(&mut self, dex_pc: DexPc, slot: QuickenSlot) {
        debug_assert!(self.records.last().map_or(true, |last| last.dex_pc <= dex_pc));
        self.records.push(QuickenRecord { dex_pc, slot });
    }

    /// Serialize the records into a quicken table
    pub fn encode(&self) -> Vec<u8> {
        let mut builder = QuickenTableBuilder::new(self.records.len());
        for record in &self.records {
            builder.add_slot(record.slot);
        }
        builder.finish()
    }

    /// Did quickening change the method's code at all?
    ///
    /// `NoIndex` records only mark genuine `nop`s, which are left as they are.
    pub fn modified_code(&self) -> bool {
        self.optimized_return_void
            || self
                .records
                .iter()
                .any(|record| record.slot != QuickenSlot::NoIndex)
    }
}

/// Compiled artifact of quickening one method: the table needed to undo it
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct QuickenedMethod {
    pub method: MethodReference,
    pub quicken_data: Vec<u8>,
}

impl QuickenedMethod {
    pub fn table(&self) -> QuickenTable<'_> {
        QuickenTable::new(&self.quicken_data).expect("quicken data produced by encoding")
    }
}

/// Quicken a method whose code item it owns exclusively, producing the compiled artifact
///
/// Returns `None` when nothing in the method could be quickened, in which case the code item is
/// left untouched.
pub fn compile_method<R: Resolver + ?Sized>(
    unit: &CompilationUnit<'_, R>,
    code: &mut CodeItem,
) -> Option<QuickenedMethod> {
    let outcome = quicken(unit, code);
    let quicken_data = outcome.encode();
    if cfg!(debug_assertions) {
        check_replay_reproduces(unit, code, &quicken_data);
    }

    if !outcome.modified_code() {
        return None;
    }
    Some(QuickenedMethod {
        method: unit.method,
        quicken_data,
    })
}

/// Replaying a fresh quickening against its own table must reproduce the table exactly
pub(crate) fn check_replay_reproduces<R: Resolver + ?Sized>(
    unit: &CompilationUnit<'_, R>,
    code: &CodeItem,
    quicken_data: &[u8],
) {
    let table = QuickenTable::new(quicken_data).expect("quicken data produced by encoding");
    let replayed = replay(unit, code, table).encode();
    assert!(
        replayed == quicken_data,
        "Mismatch producing new quicken data for {:?}",
        unit.method
    );
}

/// Quicken a code item that has never been quickened
pub fn quicken<R: Resolver + ?Sized>(
    unit: &CompilationUnit<'_, R>,
    code: &mut CodeItem,
) -> QuickenOutcome {
    let mut quickener = Quickener {
        code,
        unit,
        outcome: QuickenOutcome::new(),
    };
    walk(&mut quickener);
    let Quickener { code, outcome, .. } = quickener;

    // Readers find entries by walking the quickened instructions, so the two must line up
    let needing_index = code
        .instructions()
        .filter(|(_, insn)| needs_index(insn))
        .count();
    assert_eq!(
        needing_index,
        outcome.records.len(),
        "quicken records out of sync with the instructions of {:?}",
        unit.method
    );
    for record in &outcome.records {
        let insn = code.instruction_at(record.dex_pc);
        assert!(
            needs_index(&insn),
            "quicken record at {:?} for {:?} in {:?}",
            record.dex_pc,
            insn.opcode(),
            unit.method
        );
    }

    outcome
}

/// Re-derive the records for an already quickened code item, without modifying it
///
/// Original operands of quick instructions come out of the existing table. The records are what
/// _this_ method's context would have produced: if it disagrees with whoever quickened the code
/// item (a cast it cannot prove safe, a field it resolves differently...), the encoded result
/// differs from the existing table.
pub fn replay<R: Resolver + ?Sized>(
    unit: &CompilationUnit<'_, R>,
    code: &CodeItem,
    existing: QuickenTable<'_>,
) -> QuickenOutcome {
    let mut replayer = Replayer {
        code,
        unit,
        existing: existing.reader(),
        outcome: QuickenOutcome::new(),
    };
    walk(&mut replayer);
    assert!(
        replayer.existing.is_exhausted(),
        "Mismatched number of quicken slots: used {} of {} replaying {:?}",
        replayer.existing.consumed(),
        existing.len(),
        unit.method
    );
    replayer.outcome
}

/// Fresh quickening: rewrites instructions as it goes
struct Quickener<'c, 'u, 'a, R: ?Sized> {
    code: &'c mut CodeItem,
    unit: &'u CompilationUnit<'a, R>,
    outcome: QuickenOutcome,
}

impl<'c, 'u, 'a, R: Resolver + ?Sized> InstructionVisitor for Quickener<'c, 'u, 'a, R> {
    fn code(&self) -> &CodeItem {
        &*self.code
    }

    fn visit_return_void(&mut self, dex_pc: DexPc) {
        if self.unit.requires_constructor_barrier() {
            return;
        }
        log::trace!(
            "Replacing {} by {} at dex pc {:?} in {:?}",
            Opcode::RETURN_VOID,
            Opcode::RETURN_VOID_NO_BARRIER,
            dex_pc,
            self.unit.method
        );
        self.code.set_opcode(dex_pc, Opcode::RETURN_VOID_NO_BARRIER);
        self.outcome.optimized_return_void = true;
    }

    fn visit_check_cast(&mut self, dex_pc: DexPc) {
        if !self.unit.elides_check_cast(dex_pc) {
            return;
        }
        log::trace!(
            "Removing {} by replacing it with 2 {}s at dex pc {:?} in {:?}",
            Opcode::CHECK_CAST,
            Opcode::NOP,
            dex_pc,
            self.unit.method
        );
        let insn = self.code.instruction_at(dex_pc);
        let (register, type_index) = (insn.vreg_a_21c(), insn.vreg_b_21c());
        self.outcome
            .record(dex_pc, QuickenSlot::CheckCastHalf(register as u16));
        self.outcome
            .record(dex_pc, QuickenSlot::CheckCastHalf(type_index));

        // Both code units become `nop` with a zero register, which is what the verifier expects
        let second_half = dex_pc.advance(1);
        self.code.set_opcode(dex_pc, Opcode::NOP);
        self.code.set_vreg_a_10x(dex_pc, 0);
        self.code.set_opcode(second_half, Opcode::NOP);
        self.code.set_vreg_a_10x(second_half, 0);
    }

    fn visit_nop(&mut self, dex_pc: DexPc) -> Visit {
        // Rare in real code, but without an entry it would look like an elided `check-cast`
        self.outcome.record(dex_pc, QuickenSlot::NoIndex);
        Visit::Continue
    }

    fn visit_field_access(&mut self, dex_pc: DexPc, access: FieldAccess) {
        let insn = self.code.instruction_at(dex_pc);
        assert!(
            !insn.opcode().is_quickened(),
            "{} at dex pc {:?} in {:?} is already quickened",
            insn.opcode(),
            dex_pc,
            self.unit.method
        );
        let field_index = insn.vreg_c_22c();
        let offset = match self.unit.quick_field_offset(field_index, access.is_put) {
            Some(offset) => offset,
            None => return,
        };
        log::trace!(
            "Quickening {} to {} by replacing field index {} by field offset {} at dex pc {:?} in {:?}",
            access.generic,
            access.quick,
            field_index,
            offset,
            dex_pc,
            self.unit.method
        );
        self.code.set_opcode(dex_pc, access.quick);
        self.code.set_reference_index(dex_pc, offset);
        self.outcome
            .record(dex_pc, QuickenSlot::MemberIndex(field_index));
    }

    fn visit_virtual_invoke(&mut self, dex_pc: DexPc, invoke: VirtualInvoke) {
        let insn = self.code.instruction_at(dex_pc);
        assert!(
            !insn.opcode().is_quickened(),
            "{} at dex pc {:?} in {:?} is already quickened",
            insn.opcode(),
            dex_pc,
            self.unit.method
        );
        let method_index = if invoke.is_range {
            insn.vreg_b_3rc()
        } else {
            insn.vreg_b_35c()
        };
        let vtable_index = match self.unit.quick_vtable_index(method_index) {
            Some(vtable_index) => vtable_index,
            None => return,
        };
        log::trace!(
            "Quickening {} to {} by replacing method index {} by vtable index {} at dex pc {:?} in {:?}",
            invoke.generic,
            invoke.quick,
            method_index,
            vtable_index,
            dex_pc,
            self.unit.method
        );
        self.code.set_opcode(dex_pc, invoke.quick);
        self.code.set_reference_index(dex_pc, vtable_index);
        self.outcome
            .record(dex_pc, QuickenSlot::MemberIndex(method_index));
    }
}

/// Replay of a quickening over code that already carries it: reads, never writes
struct Replayer<'c, 'u, 'a, 't, R: ?Sized> {
    code: &'c CodeItem,
    unit: &'u CompilationUnit<'a, R>,
    existing: QuickenTableReader<'t>,
    outcome: QuickenOutcome,
}

impl<'c, 'u, 'a, 't, R: Resolver + ?Sized> Replayer<'c, 'u, 'a, 't, R> {
    /// Original index of a field access or invocation, from the table if it was quickened
    fn original_index(&mut self, dex_pc: DexPc) -> u16 {
        let insn = self.code.instruction_at(dex_pc);
        if insn.opcode().is_quickened() {
            self.existing.next_member_index()
        } else {
            // The index operand is the second code unit for 22c, 35c, and 3rc alike
            insn.units()[1]
        }
    }

    fn note_return_void(&mut self) {
        if !self.unit.requires_constructor_barrier() {
            self.outcome.optimized_return_void = true;
        }
    }
}

impl<'c, 'u, 'a, 't, R: Resolver + ?Sized> InstructionVisitor for Replayer<'c, 'u, 'a, 't, R> {
    fn code(&self) -> &CodeItem {
        self.code
    }

    fn visit_return_void(&mut self, _dex_pc: DexPc) {
        self.note_return_void();
    }

    fn visit_return_void_no_barrier(&mut self, _dex_pc: DexPc) {
        self.note_return_void();
    }

    fn visit_check_cast(&mut self, dex_pc: DexPc) {
        // Left alone by whoever quickened this code, but maybe not by us
        if self.unit.elides_check_cast(dex_pc) {
            let insn = self.code.instruction_at(dex_pc);
            self.outcome
                .record(dex_pc, QuickenSlot::CheckCastHalf(insn.vreg_a_21c() as u16));
            self.outcome
                .record(dex_pc, QuickenSlot::CheckCastHalf(insn.vreg_b_21c()));
        }
    }

    fn visit_nop(&mut self, dex_pc: DexPc) -> Visit {
        let register = match self.existing.next_nop_slot() {
            QuickenSlot::CheckCastHalf(register) => register,
            slot => {
                self.outcome.record(dex_pc, slot);
                return Visit::Continue;
            }
        };
        let type_index = self.existing.next_check_cast_type();
        if self.unit.elides_check_cast(dex_pc) {
            self.outcome
                .record(dex_pc, QuickenSlot::CheckCastHalf(register));
            self.outcome
                .record(dex_pc, QuickenSlot::CheckCastHalf(type_index));
        }
        Visit::ConsumedNext
    }

    fn visit_field_access(&mut self, dex_pc: DexPc, access: FieldAccess) {
        let field_index = self.original_index(dex_pc);
        if self
            .unit
            .quick_field_offset(field_index, access.is_put)
            .is_some()
        {
            self.outcome
                .record(dex_pc, QuickenSlot::MemberIndex(field_index));
        }
    }

    fn visit_virtual_invoke(&mut self, dex_pc: DexPc, _invoke: VirtualInvoke) {
        let method_index = self.original_index(dex_pc);
        if self.unit.quick_vtable_index(method_index).is_some() {
            self.outcome
                .record(dex_pc, QuickenSlot::MemberIndex(method_index));
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dex::DexFileId;
    use std::collections::{HashMap, HashSet};

    #[derive(Default)]
    struct FixedResolver {
        barrier: bool,
        safe_casts: HashSet<u32>,
        fields: HashMap<u16, ResolvedField>,
        methods: HashMap<u16, u32>,
    }

    impl Resolver for FixedResolver {
        fn requires_constructor_barrier(&self, _: DexFileId, _: u16) -> bool {
            self.barrier
        }

        fn is_safe_cast(&self, _: MethodReference, dex_pc: DexPc) -> bool {
            self.safe_casts.contains(&dex_pc.0)
        }

        fn resolve_instance_field(
            &self,
            _: MethodReference,
            field_index: u16,
            _: bool,
        ) -> Option<ResolvedField> {
            self.fields.get(&field_index).copied()
        }

        fn resolve_virtual_method(&self, _: MethodReference, method_index: u16) -> Option<u32> {
            self.methods.get(&method_index).copied()
        }
    }

    fn field(offset: u32) -> ResolvedField {
        ResolvedField {
            offset,
            is_volatile: false,
        }
    }

    fn unit<'a>(
        resolver: &'a FixedResolver,
        settings: &'a Settings,
        access_flags: MethodAccessFlags,
    ) -> CompilationUnit<'a, FixedResolver> {
        CompilationUnit {
            method: MethodReference::new(DexFileId(0), 1),
            class_def_index: 0,
            access_flags,
            resolver,
            settings,
        }
    }

    fn slots(outcome: &QuickenOutcome) -> Vec<(u32, QuickenSlot)> {
        outcome
            .records
            .iter()
            .map(|record| (record.dex_pc.0, record.slot))
            .collect()
    }

    #[test]
    fn field_get_and_return() {
        let resolver = FixedResolver {
            fields: vec![(5, field(12))].into_iter().collect(),
            ..FixedResolver::default()
        };
        let settings = Settings::new();
        let unit = unit(&resolver, &settings, MethodAccessFlags::PUBLIC);

        // iget v0, v1, field@5 ; return-void
        let mut code = CodeItem::new(vec![0x1052, 0x0005, 0x000e]);
        let outcome = quicken(&unit, &mut code);

        assert_eq!(code.units(), &[0x10e3, 0x000c, 0x0073]);
        assert_eq!(slots(&outcome), vec![(0, QuickenSlot::MemberIndex(5))]);
        assert!(outcome.optimized_return_void);
        assert_eq!(outcome.encode(), vec![0x01, 0x05, 0x00]);
    }

    #[test]
    fn constructor_barrier_is_kept() {
        let resolver = FixedResolver {
            barrier: true,
            ..FixedResolver::default()
        };
        let settings = Settings::new();
        let constructor = MethodAccessFlags::PUBLIC | MethodAccessFlags::CONSTRUCTOR;

        let mut code = CodeItem::new(vec![0x000e]);
        let outcome = quicken(&unit(&resolver, &settings, constructor), &mut code);
        assert_eq!(code.units(), &[0x000e]);
        assert!(!outcome.optimized_return_void);
        assert!(compile_method(&unit(&resolver, &settings, constructor), &mut code).is_none());

        // Static initializers never need the barrier
        let clinit = MethodAccessFlags::STATIC | MethodAccessFlags::CONSTRUCTOR;
        let outcome = quicken(&unit(&resolver, &settings, clinit), &mut code);
        assert_eq!(code.units(), &[0x0073]);
        assert!(outcome.optimized_return_void);
    }

    #[test]
    fn genuine_nops_alone_are_no_change() {
        let resolver = FixedResolver {
            barrier: true,
            ..FixedResolver::default()
        };
        let settings = Settings::new();
        let constructor = unit(
            &resolver,
            &settings,
            MethodAccessFlags::PUBLIC | MethodAccessFlags::CONSTRUCTOR,
        );

        // nop ; return-void
        let mut code = CodeItem::new(vec![0x0000, 0x000e]);
        let outcome = quicken(&constructor, &mut code);
        assert_eq!(slots(&outcome), vec![(0, QuickenSlot::NoIndex)]);
        assert!(!outcome.modified_code());

        assert!(compile_method(&constructor, &mut code).is_none());
        assert_eq!(code.units(), &[0x0000, 0x000e]);
    }

    #[test]
    fn unresolved_or_unfit_members_are_left_alone() {
        let resolver = FixedResolver {
            fields: vec![
                (1, field(0x1_0000)),
                (
                    2,
                    ResolvedField {
                        offset: 8,
                        is_volatile: true,
                    },
                ),
            ]
            .into_iter()
            .collect(),
            methods: vec![(4, 0x1_0000)].into_iter().collect(),
            ..FixedResolver::default()
        };
        let settings = Settings::new();
        let barrier_free = unit(&resolver, &settings, MethodAccessFlags::empty());

        // iget field@1 (offset too large) ; iput field@2 (volatile) ; iget field@3 (unresolved) ;
        // invoke-virtual method@4 (vtable index too large) ; invoke-virtual/range method@5
        // (unresolved)
        let original = vec![
            0x1052, 0x0001, 0x1059, 0x0002, 0x1052, 0x0003, 0x106e, 0x0004, 0x0001, 0x0274,
            0x0005, 0x0000,
        ];
        let mut code = CodeItem::new(original.clone());
        let outcome = quicken(&barrier_free, &mut code);
        assert_eq!(code.units(), original.as_slice());
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.encode(), vec![0x00]);
        assert!(compile_method(&barrier_free, &mut code).is_none());
    }

    #[test]
    fn virtual_invokes() {
        let resolver = FixedResolver {
            methods: vec![(0x0102, 7), (0x0203, 9)].into_iter().collect(),
            barrier: true,
            ..FixedResolver::default()
        };
        let settings = Settings::new();
        let constructor = unit(&resolver, &settings, MethodAccessFlags::CONSTRUCTOR);

        // invoke-virtual {v1, v2}, method@0x0102 ; invoke-virtual/range {v4..v5}, method@0x0203 ;
        // return-void
        let mut code = CodeItem::new(vec![
            0x206e, 0x0102, 0x0021, 0x0274, 0x0203, 0x0004, 0x000e,
        ]);
        let outcome = quicken(&constructor, &mut code);
        assert_eq!(
            code.units(),
            &[0x20e9, 0x0007, 0x0021, 0x02ea, 0x0009, 0x0004, 0x000e]
        );
        assert_eq!(
            slots(&outcome),
            vec![
                (0, QuickenSlot::MemberIndex(0x0102)),
                (3, QuickenSlot::MemberIndex(0x0203)),
            ]
        );
        assert!(!outcome.optimized_return_void);
    }

    #[test]
    fn check_casts_and_nops() {
        let resolver = FixedResolver {
            safe_casts: vec![1].into_iter().collect(),
            ..FixedResolver::default()
        };
        let settings = Settings::new();
        let unit = unit(&resolver, &settings, MethodAccessFlags::empty());

        // nop ; check-cast v3, type@0x0042 (safe) ; check-cast v4, type@0x0043 (unsafe)
        let mut code = CodeItem::new(vec![0x0000, 0x031f, 0x0042, 0x041f, 0x0043]);
        let outcome = quicken(&unit, &mut code);
        assert_eq!(code.units(), &[0x0000, 0x0000, 0x0000, 0x041f, 0x0043]);
        assert_eq!(
            slots(&outcome),
            vec![
                (0, QuickenSlot::NoIndex),
                (1, QuickenSlot::CheckCastHalf(3)),
                (1, QuickenSlot::CheckCastHalf(0x0042)),
            ]
        );
    }

    #[test]
    fn check_cast_elision_can_be_disabled() {
        let resolver = FixedResolver {
            safe_casts: vec![0].into_iter().collect(),
            fields: vec![(1, field(4))].into_iter().collect(),
            ..FixedResolver::default()
        };
        let settings = Settings {
            enable_check_cast_elision: false,
            enable_quickening: false,
            ..Settings::new()
        };
        let unit = unit(&resolver, &settings, MethodAccessFlags::empty());

        // check-cast v0, type@2 ; iget v0, v0, field@1
        let original = vec![0x001f, 0x0002, 0x0052, 0x0001];
        let mut code = CodeItem::new(original.clone());
        assert!(compile_method(&unit, &mut code).is_none());
        assert_eq!(code.units(), original.as_slice());
    }

    #[test]
    fn replay_is_idempotent() {
        let resolver = FixedResolver {
            safe_casts: vec![3].into_iter().collect(),
            fields: vec![(5, field(16))].into_iter().collect(),
            methods: vec![(6, 2)].into_iter().collect(),
            ..FixedResolver::default()
        };
        let settings = Settings::new();
        let unit = unit(&resolver, &settings, MethodAccessFlags::empty());

        // iput-object v0, v1, field@5 ; nop ; check-cast v2, type@8 ;
        // invoke-virtual {v1}, method@6 ; return-void
        let mut code = CodeItem::new(vec![
            0x105b, 0x0005, 0x0000, 0x021f, 0x0008, 0x106e, 0x0006, 0x0001, 0x000e,
        ]);
        let artifact = compile_method(&unit, &mut code).unwrap();
        let quickened = code.clone();

        let replayed = replay(&unit, &code, artifact.table());
        assert_eq!(replayed.encode(), artifact.quicken_data);
        assert!(replayed.optimized_return_void);
        assert_eq!(code, quickened);
    }

    #[test]
    fn replay_reports_disagreement() {
        let quickening_resolver = FixedResolver {
            safe_casts: vec![0].into_iter().collect(),
            fields: vec![(9, field(20))].into_iter().collect(),
            ..FixedResolver::default()
        };
        let settings = Settings::new();
        let flags = MethodAccessFlags::empty();

        // check-cast v1, type@4 ; iget v0, v1, field@9
        let mut code = CodeItem::new(vec![0x011f, 0x0004, 0x1052, 0x0009]);
        let artifact = compile_method(&unit(&quickening_resolver, &settings, flags), &mut code)
            .unwrap();

        // Same field, but this context can't prove the cast safe
        let doubting_resolver = FixedResolver {
            fields: vec![(9, field(20))].into_iter().collect(),
            ..FixedResolver::default()
        };
        let replayed = replay(
            &unit(&doubting_resolver, &settings, flags),
            &code,
            artifact.table(),
        );
        assert_ne!(replayed.encode(), artifact.quicken_data);
        assert_eq!(slots(&replayed), vec![(2, QuickenSlot::MemberIndex(9))]);
    }

    #[test]
    #[should_panic(expected = "already quickened")]
    fn fresh_quickening_rejects_quick_instructions() {
        let resolver = FixedResolver::default();
        let settings = Settings::new();
        let mut code = CodeItem::new(vec![0x10e3, 0x000c]);
        quicken(
            &unit(&resolver, &settings, MethodAccessFlags::empty()),
            &mut code,
        );
    }

    #[test]
    #[should_panic(expected = "Mismatched number of quicken slots")]
    fn replay_must_use_the_whole_table() {
        let resolver = FixedResolver::default();
        let settings = Settings::new();
        let code = CodeItem::new(vec![0x000e]);
        let data = crate::quicken::encode(&[1]);
        replay(
            &unit(&resolver, &settings, MethodAccessFlags::empty()),
            &code,
            QuickenTable::new(&data).unwrap(),
        );
    }
}
