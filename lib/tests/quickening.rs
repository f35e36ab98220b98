use dexquicken::dex::{
    CodeItem, CodeItemId, DexFileId, DexPc, MethodAccessFlags, MethodDecl, MethodReference,
};
use dexquicken::quicken::{
    self, compile_method, dequicken, replay, unquicken_methods, CompilationUnit, QuickenSection,
    QuickenSectionBuilder, QuickenTable, QuickeningSession, ResolvedField, Resolver, Settings,
    NO_INDEX,
};
use std::collections::HashMap;
use std::thread;

/// Resolution results fixed upfront, the same for every method
#[derive(Default)]
struct TableResolver {
    barrier: bool,
    safe_casts: Vec<u32>,
    fields: HashMap<u16, u32>,
    methods: HashMap<u16, u32>,
}

impl Resolver for TableResolver {
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
        self.fields.get(&field_index).map(|offset| ResolvedField {
            offset: *offset,
            is_volatile: false,
        })
    }

    fn resolve_virtual_method(&self, _: MethodReference, method_index: u16) -> Option<u32> {
        self.methods.get(&method_index).copied()
    }
}

fn method(index: u32) -> MethodReference {
    MethodReference::new(DexFileId(1), index)
}

fn unit<'a>(
    index: u32,
    resolver: &'a TableResolver,
    settings: &'a Settings,
) -> CompilationUnit<'a, TableResolver> {
    CompilationUnit {
        method: method(index),
        class_def_index: 3,
        access_flags: MethodAccessFlags::PUBLIC | MethodAccessFlags::FINAL,
        resolver,
        settings,
    }
}

/// Exercises every kind of rewrite, next to a switch payload
fn busy_method() -> CodeItem {
    CodeItem::new(vec![
        0x002b, 0x0010, 0x0000, // packed-switch v0, +16
        0x1254, 0x0007, // iget-object v2, v1, field@7
        0x021f, 0x0009, // check-cast v2, type@9
        0x106e, 0x0004, 0x0002, // invoke-virtual {v2}, method@4
        0x1059, 0x0008, // iput v0, v1, field@8
        0x0000, // nop
        0x000e, // return-void
        0x0000, 0x0000, // nop ; nop
        0x0100, 0x0001, 0x0000, 0x0000, 0x0003, 0x0000, // packed-switch-payload
    ])
}

fn busy_resolver() -> TableResolver {
    TableResolver {
        safe_casts: vec![5],
        fields: vec![(7, 8), (8, 0x1_0004)].into_iter().collect(),
        methods: vec![(4, 3)].into_iter().collect(),
        ..TableResolver::default()
    }
}

#[test]
fn field_get_round_trip() {
    let resolver = TableResolver {
        fields: vec![(5, 12)].into_iter().collect(),
        ..TableResolver::default()
    };
    let settings = Settings::new();

    let original = CodeItem::new(vec![0x1052, 0x0005, 0x000e]);
    let mut code = original.clone();
    let quickened = compile_method(&unit(0, &resolver, &settings), &mut code).unwrap();

    assert_eq!(code.units(), &[0x10e3, 0x000c, 0x0073]);
    assert_eq!(quickened.method, method(0));
    assert_eq!(quickened.table().iter().collect::<Vec<_>>(), vec![5]);

    dequicken(&mut code, quickened.table(), true);
    assert_eq!(code, original);
}

#[test]
fn genuine_nop_gets_a_sentinel() {
    let settings = Settings::new();
    let resolver = TableResolver::default();

    // Eight `const/4`s, then a `nop` at dex pc 8
    let mut units = vec![0x0012; 8];
    units.extend([0x0000, 0x000e]);
    let original = CodeItem::new(units);

    let mut code = original.clone();
    let outcome = quicken::quicken(&unit(0, &resolver, &settings), &mut code);
    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.records[0].dex_pc, DexPc(8));
    let quicken_data = outcome.encode();
    assert_eq!(quicken_data, quicken::encode(&[NO_INDEX]));

    // Only the return changed, and dequickening has exactly one entry to use
    dequicken(
        &mut code,
        QuickenTable::new(&quicken_data).unwrap(),
        true,
    );
    assert_eq!(code, original);
}

#[test]
fn busy_method_round_trip() {
    let resolver = busy_resolver();
    let settings = Settings::new();

    let original = busy_method();
    let mut code = original.clone();
    let quickened = compile_method(&unit(2, &resolver, &settings), &mut code).unwrap();
    assert_eq!(
        code.units(),
        &[
            0x002b, 0x0010, 0x0000, //
            0x12e5, 0x0008, //
            0x0000, 0x0000, //
            0x10e9, 0x0003, 0x0002, //
            0x1059, 0x0008, // offset does not fit in 16 bits
            0x0000, //
            0x0073, //
            0x0000, 0x0000, //
            0x0100, 0x0001, 0x0000, 0x0000, 0x0003, 0x0000,
        ]
    );
    assert_eq!(
        quickened.table().iter().collect::<Vec<_>>(),
        vec![7, 2, 9, 4, NO_INDEX, NO_INDEX, NO_INDEX, NO_INDEX]
    );

    // Replaying changes nothing and agrees on every entry
    let before_replay = code.clone();
    let replayed = replay(&unit(2, &resolver, &settings), &code, quickened.table());
    assert_eq!(replayed.encode(), quickened.quicken_data);
    assert_eq!(code, before_replay);

    let mut kept_return = code.clone();
    dequicken(&mut kept_return, quickened.table(), false);
    assert_eq!(kept_return.units()[13], 0x0073);

    dequicken(&mut code, quickened.table(), true);
    assert_eq!(code, original);
}

#[test]
fn bytes_survive_the_round_trip() {
    let original = busy_method();
    let bytes = original.to_le_bytes();
    assert_eq!(&bytes[..6], &[0x2b, 0x00, 0x10, 0x00, 0x00, 0x00]);
    assert_eq!(CodeItem::from_le_bytes(&bytes).unwrap(), original);
    assert!(CodeItem::from_le_bytes(&bytes[1..]).is_err());

    // Cut in the middle of the `invoke-virtual`
    assert!(CodeItem::from_le_bytes(&bytes[..18]).is_err());
}

#[test]
fn concurrent_sharers_that_agree() {
    let decls: Vec<MethodDecl> = (0..4)
        .map(|idx| MethodDecl {
            method: method(idx),
            code_item: CodeItemId(0x40),
        })
        .collect();
    let mut code_items = HashMap::new();
    code_items.insert(CodeItemId(0x40), busy_method());

    let settings = Settings::new();
    let session = QuickeningSession::new(&decls, &mut code_items);
    let resolver = busy_resolver();
    for decl in &decls {
        session.mark_for_compilation(decl.method);
    }
    assert_eq!(session.num_code_items_to_quicken(), 4);

    let artifacts: Vec<_> = thread::scope(|scope| {
        let workers: Vec<_> = decls
            .iter()
            .map(|decl| {
                let (session, resolver, settings) = (&session, &resolver, &settings);
                scope.spawn(move || {
                    assert!(session.should_compile_method(decl.method));
                    let unit = unit(decl.method.method_index, resolver, settings);
                    session.quicken_shared(&unit, decl.code_item)
                })
            })
            .collect();
        workers
            .into_iter()
            .map(|worker| worker.join().unwrap())
            .collect()
    });

    assert!(artifacts.iter().all(Option::is_some));
    let first = artifacts[0].as_ref().unwrap();
    assert!(artifacts
        .iter()
        .all(|artifact| artifact.as_ref().unwrap().quicken_data == first.quicken_data));

    let state = session.quicken_state(CodeItemId(0x40)).unwrap();
    assert_eq!(state.methods.len(), 4);
    assert!(!state.conflict);

    let report = session.finish(&mut code_items);
    assert!(report.discarded_methods.is_empty());
    assert_ne!(code_items[&CodeItemId(0x40)], busy_method());
}

#[test]
fn concurrent_sharers_that_disagree() {
    let decls: Vec<MethodDecl> = (0..6)
        .map(|idx| MethodDecl {
            method: method(idx),
            code_item: CodeItemId(0x40),
        })
        .collect();
    let mut code_items = HashMap::new();
    code_items.insert(CodeItemId(0x40), busy_method());
    code_items.insert(CodeItemId(0x80), CodeItem::new(vec![0x000e]));

    let settings = Settings::new();
    let session = QuickeningSession::new(&decls, &mut code_items);
    assert_eq!(code_items.len(), 1);

    // Half of the sharers cannot prove the cast safe
    let trusting = busy_resolver();
    let doubting = TableResolver {
        safe_casts: vec![],
        ..busy_resolver()
    };

    thread::scope(|scope| {
        for decl in &decls {
            let resolver = if decl.method.method_index % 2 == 0 {
                &trusting
            } else {
                &doubting
            };
            let (session, settings) = (&session, &settings);
            scope.spawn(move || {
                let unit = unit(decl.method.method_index, resolver, settings);
                session.quicken_shared(&unit, decl.code_item);
            });
        }
    });

    assert!(session.quicken_state(CodeItemId(0x40)).unwrap().conflict);
    let report = session.finish(&mut code_items);
    assert_eq!(report.unquickened, vec![CodeItemId(0x40)]);
    assert_eq!(
        report.discarded_methods,
        decls.iter().map(|decl| decl.method).collect::<Vec<_>>()
    );

    // The original `check-cast` is back, along with everything else
    assert_eq!(code_items[&CodeItemId(0x40)], busy_method());
    assert_eq!(code_items.len(), 2);
}

#[test]
fn constructors_of_classes_needing_barriers() {
    let resolver = TableResolver {
        barrier: true,
        fields: vec![(5, 12)].into_iter().collect(),
        ..TableResolver::default()
    };
    let settings = Settings::new();
    let constructor = CompilationUnit {
        access_flags: MethodAccessFlags::PUBLIC | MethodAccessFlags::CONSTRUCTOR,
        ..unit(0, &resolver, &settings)
    };
    let method = CompilationUnit {
        access_flags: MethodAccessFlags::PUBLIC,
        ..unit(1, &resolver, &settings)
    };

    // iput v0, v1, field@5 ; return-void
    let original = CodeItem::new(vec![0x1059, 0x0005, 0x000e]);

    let mut code = original.clone();
    let quickened = compile_method(&constructor, &mut code).unwrap();
    assert_eq!(code.units(), &[0x10e6, 0x000c, 0x000e]);
    dequicken(&mut code, quickened.table(), true);
    assert_eq!(code, original);

    let mut code = original.clone();
    compile_method(&method, &mut code).unwrap();
    assert_eq!(code.units(), &[0x10e6, 0x000c, 0x0073]);
}

#[test]
fn section_round_trip() {
    let resolver = busy_resolver();
    let settings = Settings::new();

    // Methods 0 and 1 share a code item, method 2 has no code, method 3 is not quickenable
    let decls = vec![
        MethodDecl {
            method: method(0),
            code_item: CodeItemId(0x100),
        },
        MethodDecl {
            method: method(1),
            code_item: CodeItemId(0x100),
        },
        MethodDecl {
            method: method(3),
            code_item: CodeItemId(0x300),
        },
        MethodDecl {
            method: method(4),
            code_item: CodeItemId(0x400),
        },
    ];
    let mut code_items = HashMap::new();
    code_items.insert(CodeItemId(0x100), busy_method());
    code_items.insert(CodeItemId(0x300), CodeItem::new(vec![0x0012, 0x000f]));
    code_items.insert(
        CodeItemId(0x400),
        CodeItem::new(vec![0x1052, 0x0007, 0x000e]),
    );
    let originals = code_items.clone();

    let session = QuickeningSession::new(&decls, &mut code_items);
    let mut builder = QuickenSectionBuilder::new(5);
    for decl in &decls {
        let unit = unit(decl.method.method_index, &resolver, &settings);
        let quickened = if session.is_shared(decl.code_item) {
            session.quicken_shared(&unit, decl.code_item)
        } else {
            let code = code_items.get_mut(&decl.code_item).unwrap();
            compile_method(&unit, code)
        };
        if let Some(quickened) = quickened {
            builder.add_method(&quickened).unwrap();
        }
    }
    let report = session.finish(&mut code_items);
    assert!(report.discarded_methods.is_empty());

    let bytes = builder.finish();
    let section = QuickenSection::new(&bytes).unwrap();
    assert_eq!(section.quickened_methods().collect::<Vec<_>>(), vec![0, 1, 4]);
    assert!(section.quicken_table_of(3).unwrap().is_none());

    let restored = unquicken_methods(&section, &decls, &mut code_items, true).unwrap();
    assert_eq!(restored, 2);
    assert_eq!(code_items, originals);
}
