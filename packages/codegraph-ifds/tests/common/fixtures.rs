//! Program fixtures

use codegraph_ifds::program::{Inst, MethodId, Operand, ProgramBuilder, ProgramGraph, StmtId};

pub fn method(name: &str) -> MethodId {
    MethodId::new(name)
}

pub fn stmt(name: &str, index: usize) -> StmtId {
    StmtId::new(MethodId::new(name), index)
}

/// `x = null; y = x.f()`
pub fn fixture_null_dereference() -> ProgramGraph {
    ProgramBuilder::new()
        .method(
            "app.Main.main",
            &[],
            vec![
                Inst::null("x"),
                Inst::virtual_call(Some("y"), "x", "lib.Obj.f", vec![]),
            ],
        )
        .build()
        .expect("valid program")
}

/// `x = null; if (x == null) return; y = x.f()`
pub fn fixture_guarded_dereference() -> ProgramGraph {
    ProgramBuilder::new()
        .method(
            "app.Main.main",
            &[],
            vec![
                Inst::null("x"),
                Inst::if_null("x", 3, 2),
                Inst::virtual_call(Some("y"), "x", "lib.Obj.f", vec![]),
                Inst::ret_void(),
            ],
        )
        .build()
        .expect("valid program")
}

/// `Caller.main` passes null to `Callee.use_it`, which reads `p.f`
pub fn fixture_cross_unit_null() -> ProgramGraph {
    ProgramBuilder::new()
        .method(
            "app.a.Caller.main",
            &[],
            vec![Inst::call(None, "app.b.Callee.use_it", vec![Operand::Null])],
        )
        .method(
            "app.b.Callee.use_it",
            &["p"],
            vec![Inst::load("v", "p", "f"), Inst::ret("v")],
        )
        .build()
        .expect("valid program")
}

/// Tainted value passed through a recursive method that never reaches a sink
pub fn fixture_recursive_taint() -> ProgramGraph {
    ProgramBuilder::new()
        .method(
            "app.Main.main",
            &[],
            vec![
                Inst::call(Some("x"), "lib.Http.param", vec![]),
                Inst::call(None, "app.Main.rec", vec![Operand::local("x")]),
                Inst::call(None, "lib.Db.query", vec![Operand::constant("SELECT 1")]),
            ],
        )
        .method(
            "app.Main.rec",
            &["p"],
            vec![
                Inst::if_null("p", 3, 1),
                Inst::call(None, "app.Main.rec", vec![Operand::local("p")]),
                Inst::call(Some("q"), "lib.Str.trim", vec![Operand::local("p")]),
                Inst::ret_void(),
            ],
        )
        .build()
        .expect("valid program")
}

/// Source in one class, sink in another
pub fn fixture_cross_unit_taint() -> ProgramGraph {
    ProgramBuilder::new()
        .method(
            "app.web.Controller.handle",
            &[],
            vec![
                Inst::call(Some("id"), "lib.Http.param", vec![]),
                Inst::call(None, "app.db.Repo.find", vec![Operand::local("id")]),
            ],
        )
        .method(
            "app.db.Repo.find",
            &["key"],
            vec![
                Inst::call(Some("sql"), "lib.Str.concat", vec![Operand::constant("SELECT "), Operand::local("key")]),
                Inst::call(None, "lib.Db.query", vec![Operand::local("sql")]),
            ],
        )
        .build()
        .expect("valid program")
}

/// A start-method parameter flows into a sink
pub fn fixture_parameter_to_sink() -> ProgramGraph {
    ProgramBuilder::new()
        .method(
            "app.Web.handle",
            &["input"],
            vec![
                Inst::copy("q", "input"),
                Inst::call(None, "lib.Db.query", vec![Operand::local("q")]),
            ],
        )
        .build()
        .expect("valid program")
}

/// `x` is assigned and never read
pub fn fixture_unused_value() -> ProgramGraph {
    ProgramBuilder::new()
        .method(
            "app.Main.main",
            &[],
            vec![
                Inst::constant("x", "1"),
                Inst::constant("y", "2"),
                Inst::call(None, "lib.Log.info", vec![Operand::local("y")]),
            ],
        )
        .build()
        .expect("valid program")
}

/// `a = make(); t = a; b = make(); c = b.f()` where `make` returns null
pub fn fixture_repeated_call() -> ProgramGraph {
    ProgramBuilder::new()
        .method(
            "app.Main.main",
            &[],
            vec![
                Inst::call(Some("a"), "app.Main.make", vec![]),
                Inst::copy("t", "a"),
                Inst::call(Some("b"), "app.Main.make", vec![]),
                Inst::virtual_call(Some("c"), "b", "lib.Obj.f", vec![]),
            ],
        )
        .method("app.Main.make", &[], vec![Inst::ret_null()])
        .build()
        .expect("valid program")
}

/// `a = p.f; if (p == null) return; p.g()` where nothing passes null for `p`
pub fn fixture_inconsistent_null_check() -> ProgramGraph {
    ProgramBuilder::new()
        .method(
            "app.Svc.handle",
            &["p"],
            vec![
                Inst::load("a", "p", "f"),
                Inst::if_null("p", 3, 2),
                Inst::virtual_call(None, "p", "lib.Obj.g", vec![]),
                Inst::ret_void(),
            ],
        )
        .build()
        .expect("valid program")
}

/// `a = source(); holder.f = a; b = holder.f; sink(b)` next to an escaped copy
pub fn fixture_field_alias() -> ProgramGraph {
    ProgramBuilder::new()
        .method(
            "app.Main.main",
            &["holder"],
            vec![
                Inst::call(Some("a"), "lib.Http.param", vec![]),
                Inst::store("holder", "f", Operand::local("a")),
                Inst::load("b", "holder", "f"),
                Inst::call(None, "lib.Db.query", vec![Operand::local("b")]),
                Inst::call(Some("c"), "lib.Html.escape", vec![Operand::local("b")]),
                Inst::call(None, "lib.Db.query", vec![Operand::local("c")]),
            ],
        )
        .build()
        .expect("valid program")
}

/// `methods` methods in a call chain, each with `width` copies before the call
pub fn fixture_call_chain(methods: usize, width: usize) -> ProgramGraph {
    let mut builder = ProgramBuilder::new();
    for i in 0..methods {
        let mut insts = vec![Inst::null("v0")];
        for j in 1..width {
            insts.push(Inst::copy(&format!("v{j}"), &format!("v{}", j - 1)));
        }
        if i + 1 < methods {
            insts.push(Inst::call(
                Some("r"),
                &format!("app.C{}.m", i + 1),
                vec![Operand::local(format!("v{}", width - 1))],
            ));
        }
        builder = builder.method(&format!("app.C{i}.m"), &["p"], insts);
    }
    builder.build().expect("valid program")
}
