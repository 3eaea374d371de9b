use std::fmt::Write;

use crate::{
    kernel::LayoutFamily,
    tier::{
        certificate::ComplianceCertificate,
        kernel_specializer::{CompiledKernel, KernelPlan},
    },
};

/// Source text of a specialized kernel.
/// * Leading `//` lines carry the certificate, the first one names the layout family.
/// * The body is a standalone `ask_pattern` with the dimensions baked in.
#[derive(Clone, Debug)]
pub struct KernelArtifact<'a> {
    plan: &'a KernelPlan,
    certificate: &'a ComplianceCertificate,
}

impl<'a> KernelArtifact<'a> {
    pub fn new(plan: &'a KernelPlan, certificate: &'a ComplianceCertificate) -> Self {
        Self { plan, certificate }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "// layout: {}", self.plan.kernel_name());
        out.push_str(&self.certificate.render_with_prefix("// "));
        out.push('\n');

        let p = self.plan.profile;
        let _ = writeln!(out, "pub const SUBJECTS: usize = {};", p.num_subjects);
        let _ = writeln!(out, "pub const PREDICATES: usize = {};", p.num_predicates);
        let _ = writeln!(out, "pub const OBJECTS: usize = {};", p.num_objects);
        let _ = writeln!(out, "pub const WORDS: usize = SUBJECTS.div_ceil(64);");
        out.push('\n');

        if self.plan.is_sharded() {
            self.render_sharded(&mut out);
        } else {
            out.push_str(leaf_source(self.plan.layout, "ask_pattern"));
        }
        out
    }

    fn render_sharded(&self, out: &mut String) {
        let shards = self.plan.shards;
        let _ = writeln!(out, "pub const NUM_SHARDS: u32 = {shards};");
        let _ = writeln!(out, "pub const SHARD_SHIFT: u32 = {};", shards.trailing_zeros());
        out.push('\n');
        let _ = writeln!(out, "#[inline(always)]");
        let _ = writeln!(out, "pub fn shard_of(s: u32) -> usize {{");
        let _ = writeln!(out, "    (s & (NUM_SHARDS - 1)) as usize");
        let _ = writeln!(out, "}}");
        out.push('\n');
        out.push_str(leaf_source(self.plan.layout, "ask_shard"));
        out.push('\n');
        let _ = writeln!(out, "#[inline(always)]");
        let _ = writeln!(
            out,
            "pub fn ask_pattern(shards: &[Shard], s: u32, p: u32, o: u32) -> bool {{"
        );
        let _ = writeln!(
            out,
            "    (s as usize) < SUBJECTS && ask_shard(&shards[shard_of(s)], s >> SHARD_SHIFT, p, o)"
        );
        let _ = writeln!(out, "}}");
    }
}

impl CompiledKernel {
    pub fn artifact(&self) -> KernelArtifact<'_> {
        KernelArtifact::new(&self.plan, &self.certificate)
    }
}

fn leaf_source(layout: LayoutFamily, name: &str) -> &'static str {
    match (layout, name) {
        (LayoutFamily::Direct, "ask_pattern") => DIRECT_ASK,
        (LayoutFamily::Direct, _) => DIRECT_SHARD,
        (LayoutFamily::BitVector, "ask_pattern") => BITVECTOR_ASK,
        (LayoutFamily::BitVector, _) => BITVECTOR_SHARD,
        (_, "ask_pattern") => COMPRESSED_ASK,
        (_, _) => COMPRESSED_SHARD,
    }
}

macro_rules! direct_source {
    ($name:literal, $ty:literal) => {
        concat!(
            "pub struct ", $ty, " {\n",
            "    pub objects: Vec<u32>,\n",
            "    pub subjects: usize,\n",
            "}\n\n",
            "#[inline(always)]\n",
            "pub fn ", $name, "(k: &", $ty, ", s: u32, p: u32, o: u32) -> bool {\n",
            "    (s as usize) < k.subjects\n",
            "        && (p as usize) < PREDICATES\n",
            "        && o != u32::MAX\n",
            "        && k.objects[p as usize * k.subjects + s as usize] == o\n",
            "}\n",
        )
    };
}

macro_rules! bitvector_source {
    ($name:literal, $ty:literal) => {
        concat!(
            "pub struct ", $ty, " {\n",
            "    pub pv: Vec<[u64; WORDS]>,\n",
            "    pub ov: Vec<[u64; WORDS]>,\n",
            "    pub triples: Vec<(u32, u32, u32)>,\n",
            "}\n\n",
            "#[inline(always)]\n",
            "pub fn ", $name, "(k: &", $ty, ", s: u32, p: u32, o: u32) -> bool {\n",
            "    let (w, b) = ((s >> 6) as usize, 1u64 << (s & 63));\n",
            "    (p as usize) < PREDICATES\n",
            "        && (o as usize) < OBJECTS\n",
            "        && w < WORDS\n",
            "        && k.pv[p as usize][w] & k.ov[o as usize][w] & b != 0\n",
            "        && k.triples.binary_search(&(s, p, o)).is_ok()\n",
            "}\n",
        )
    };
}

macro_rules! compressed_source {
    ($name:literal, $ty:literal) => {
        concat!(
            "pub struct ", $ty, " {\n",
            "    pub row_ptrs: Vec<u32>,\n",
            "    pub col_subjects: Vec<u32>,\n",
            "    pub value_ptrs: Vec<u32>,\n",
            "    pub values: Vec<u32>,\n",
            "    pub dictionary: Vec<u32>,\n",
            "}\n\n",
            "#[inline(always)]\n",
            "pub fn ", $name, "(k: &", $ty, ", s: u32, p: u32, o: u32) -> bool {\n",
            "    let Ok(code) = k.dictionary.binary_search(&o) else {\n",
            "        return false;\n",
            "    };\n",
            "    if p as usize >= PREDICATES {\n",
            "        return false;\n",
            "    }\n",
            "    let (lo, hi) = (k.row_ptrs[p as usize] as usize, k.row_ptrs[p as usize + 1] as usize);\n",
            "    let Ok(i) = k.col_subjects[lo..hi].binary_search(&s) else {\n",
            "        return false;\n",
            "    };\n",
            "    let (a, b) = (k.value_ptrs[lo + i] as usize, k.value_ptrs[lo + i + 1] as usize);\n",
            "    k.values[a..b].binary_search(&(code as u32)).is_ok()\n",
            "}\n",
        )
    };
}

const DIRECT_ASK: &str = direct_source!("ask_pattern", "Kernel");
const DIRECT_SHARD: &str = direct_source!("ask_shard", "Shard");
const BITVECTOR_ASK: &str = bitvector_source!("ask_pattern", "Kernel");
const BITVECTOR_SHARD: &str = bitvector_source!("ask_shard", "Shard");
const COMPRESSED_ASK: &str = compressed_source!("ask_pattern", "Kernel");
const COMPRESSED_SHARD: &str = compressed_source!("ask_shard", "Shard");
