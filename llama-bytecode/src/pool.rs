//! Constant, function and class pools. `ConstantPool::get` deduplicates via linear
//! search exactly as the original `std::find_if` scan does; `FunctionPool`/`ClassPool`
//! are append-only.

use crate::numeric::{pack, ByteReader};

#[derive(Debug, Clone, PartialEq)]
pub enum ConstantEntry {
    None,
    Userdata(Vec<u8>),
    Int(i32),
    Float(f64),
    String(String),
}

impl ConstantEntry {
    fn kind_byte(&self) -> u8 {
        match self {
            ConstantEntry::None => 0,
            ConstantEntry::Userdata(_) => 1,
            ConstantEntry::Int(_) => 2,
            ConstantEntry::Float(_) => 3,
            ConstantEntry::String(_) => 4,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            ConstantEntry::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            ConstantEntry::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConstantEntry::String(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn dump(&self) -> String {
        match self {
            ConstantEntry::None => "unknown".to_string(),
            ConstantEntry::Userdata(bytes) => bytes.iter().map(|b| format!("{b:02x}")).collect(),
            ConstantEntry::Int(v) => v.to_string(),
            ConstantEntry::Float(v) => v.to_string(),
            ConstantEntry::String(v) => v.clone(),
        }
    }

    fn payload(&self) -> Vec<u8> {
        match self {
            ConstantEntry::None => Vec::new(),
            ConstantEntry::Userdata(bytes) => bytes.clone(),
            ConstantEntry::Int(v) => v.to_le_bytes().to_vec(),
            ConstantEntry::Float(v) => v.to_le_bytes().to_vec(),
            ConstantEntry::String(s) => {
                let mut bytes = s.as_bytes().to_vec();
                bytes.push(0);
                bytes
            }
        }
    }

    fn from_parts(kind: u8, payload: &[u8]) -> Option<ConstantEntry> {
        Some(match kind {
            0 => ConstantEntry::None,
            1 => ConstantEntry::Userdata(payload.to_vec()),
            2 => ConstantEntry::Int(i32::from_le_bytes(payload.try_into().ok()?)),
            3 => ConstantEntry::Float(f64::from_le_bytes(payload.try_into().ok()?)),
            4 => {
                let end = payload.iter().position(|&b| b == 0).unwrap_or(payload.len());
                ConstantEntry::String(String::from_utf8_lossy(&payload[..end]).into_owned())
            }
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    entries: Vec<ConstantEntry>,
}

impl ConstantPool {
    pub fn new() -> Self {
        ConstantPool { entries: Vec::new() }
    }

    /// Returns the index of a byte-equal entry if one exists, otherwise appends and
    /// returns the freshly assigned index. Indices, once returned, never change.
    pub fn get(&mut self, entry: ConstantEntry) -> usize {
        if let Some(idx) = self.entries.iter().position(|e| *e == entry) {
            return idx;
        }
        self.entries.push(entry);
        self.entries.len() - 1
    }

    pub fn at(&self, idx: usize) -> Option<&ConstantEntry> {
        self.entries.get(idx)
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn dump(&self) -> String {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| format!("{i}: {}", e.dump()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn build(&self, out: &mut Vec<u8>) {
        pack::<u32>(out, self.entries.len() as u32);
        for entry in &self.entries {
            out.push(entry.kind_byte());
            let payload = entry.payload();
            pack::<u32>(out, payload.len() as u32);
            out.extend_from_slice(&payload);
        }
    }

    pub fn read(reader: &mut ByteReader) -> Option<ConstantPool> {
        let count: u32 = reader.next()?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let kind: u8 = reader.next()?;
            let len: u32 = reader.next()?;
            let payload = reader.next_bytes(len as usize)?;
            entries.push(ConstantEntry::from_parts(kind, payload)?);
        }
        Some(ConstantPool { entries })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub field: String,
    pub type_name: String,
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionEntry {
    pub name: String,
    pub args: Vec<Argument>,
    pub data: Vec<u8>,
    pub line: u32,
    /// `true` if this entry is bound to a host-registered native function rather
    /// than owning its own bytecode body.
    pub native: bool,
}

impl FunctionEntry {
    pub fn new(name: impl Into<String>) -> Self {
        FunctionEntry { name: name.into(), args: Vec::new(), data: Vec::new(), line: 0, native: false }
    }

    pub fn argc(&self) -> usize {
        self.args.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FunctionPool {
    entries: Vec<FunctionEntry>,
}

impl FunctionPool {
    pub fn new() -> Self {
        FunctionPool { entries: Vec::new() }
    }

    pub fn add(&mut self, entry: FunctionEntry) -> usize {
        self.entries.push(entry);
        self.entries.len() - 1
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn at(&self, idx: usize) -> Option<&FunctionEntry> {
        self.entries.get(idx)
    }

    pub fn at_mut(&mut self, idx: usize) -> Option<&mut FunctionEntry> {
        self.entries.get_mut(idx)
    }

    pub fn dump_signature(&self, idx: usize) -> String {
        let Some(entry) = self.at(idx) else { return String::new() };
        let mut s = String::from("fn");
        if !entry.name.is_empty() {
            s.push(' ');
            s.push_str(&entry.name);
        }
        s.push('(');
        for (i, arg) in entry.args.iter().enumerate() {
            if i > 0 {
                s.push_str(", ");
            }
            s.push_str(&arg.field);
            if !arg.type_name.is_empty() {
                s.push_str(": ");
                s.push_str(&arg.type_name);
            }
        }
        s.push_str("):");
        s
    }

    pub fn build(&self, out: &mut Vec<u8>) {
        pack::<u32>(out, self.entries.len() as u32);
        for entry in &self.entries {
            write_lenstr(out, &entry.name);
            pack::<u16>(out, entry.args.len() as u16);
            for arg in &entry.args {
                write_lenstr(out, &arg.field);
                write_lenstr(out, &arg.type_name);
                out.push(arg.optional as u8);
            }
            pack::<u32>(out, entry.data.len() as u32);
            out.extend_from_slice(&entry.data);
            pack::<u32>(out, entry.line);
        }
    }

    pub fn read(reader: &mut ByteReader) -> Option<FunctionPool> {
        let count: u32 = reader.next()?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let name = read_lenstr(reader)?;
            let argc: u16 = reader.next()?;
            let mut args = Vec::with_capacity(argc as usize);
            for _ in 0..argc {
                let field = read_lenstr(reader)?;
                let type_name = read_lenstr(reader)?;
                let optional: u8 = reader.next()?;
                args.push(Argument { field, type_name, optional: optional != 0 });
            }
            let code_len: u32 = reader.next()?;
            let data = reader.next_bytes(code_len as usize)?.to_vec();
            let line: u32 = reader.next()?;
            entries.push(FunctionEntry { name, args, data, line, native: false });
        }
        Some(FunctionPool { entries })
    }
}

fn write_lenstr(out: &mut Vec<u8>, s: &str) {
    pack::<u32>(out, s.len() as u32);
    out.extend_from_slice(s.as_bytes());
}

fn read_lenstr(reader: &mut ByteReader) -> Option<String> {
    let len: u32 = reader.next()?;
    let bytes = reader.next_bytes(len as usize)?;
    Some(String::from_utf8_lossy(bytes).into_owned())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub type_name: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassEntry {
    pub properties: Vec<Property>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct ClassPool {
    entries: Vec<ClassEntry>,
}

impl ClassPool {
    pub fn new() -> Self {
        ClassPool { entries: Vec::new() }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn add(&mut self, entry: ClassEntry) -> usize {
        self.entries.push(entry);
        self.entries.len() - 1
    }

    pub fn remove(&mut self, idx: usize) {
        if idx < self.entries.len() {
            self.entries.remove(idx);
        }
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn at(&self, idx: usize) -> Option<&ClassEntry> {
        self.entries.get(idx)
    }

    pub fn build(&self, out: &mut Vec<u8>) {
        pack::<u32>(out, self.entries.len() as u32);
        for entry in &self.entries {
            pack::<u32>(out, entry.properties.len() as u32);
            for prop in &entry.properties {
                write_lenstr(out, &prop.name);
                write_lenstr(out, &prop.type_name);
            }
            pack::<u32>(out, entry.data.len() as u32);
            out.extend_from_slice(&entry.data);
        }
    }

    pub fn read(reader: &mut ByteReader) -> Option<ClassPool> {
        let count: u32 = reader.next()?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let prop_count: u32 = reader.next()?;
            let mut properties = Vec::with_capacity(prop_count as usize);
            for _ in 0..prop_count {
                let name = read_lenstr(reader)?;
                let type_name = read_lenstr(reader)?;
                properties.push(Property { name, type_name });
            }
            let data_len: u32 = reader.next()?;
            let data = reader.next_bytes(data_len as usize)?.to_vec();
            entries.push(ClassEntry { properties, data });
        }
        Some(ClassPool { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_pool_deduplicates_byte_equal_entries() {
        let mut pool = ConstantPool::new();
        let a = pool.get(ConstantEntry::Int(7));
        let b = pool.get(ConstantEntry::Int(7));
        let c = pool.get(ConstantEntry::Int(8));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn function_pool_is_append_only_and_searchable() {
        let mut pool = FunctionPool::new();
        pool.add(FunctionEntry::new("sq"));
        assert!(pool.has("sq"));
        assert_eq!(pool.get("sq"), Some(0));
        assert_eq!(pool.get("missing"), None);
    }
}
